//! Workspace-wide index of mixin definitions.
//!
//! # Lifecycle
//!
//! ```text
//! NotBuilt --build_full--> Building --complete--> Ready
//!                             |  ^                  |
//!                  cancelled  |  +---build_full-----+
//!                             v
//!                 previous state restored
//! ```
//!
//! Lookups against `NotBuilt` or `Building` answer [`Lookup::Unknown`], never
//! [`Lookup::NotFound`]. A build collects into a private map and publishes it
//! in one step, so a half-built map is never observable.
//!
//! # Mutations
//!
//! `build_full`, `on_file_changed`, `on_file_created` and `on_file_deleted`
//! are serialised by an async mutex held for their whole duration. An event
//! arriving during a build waits for it and then applies to the fresh index.
//! [`MixinIndex::build_discovered`] lists the workspace only once it holds
//! the mutex, so a file created between discovery and publication is never
//! dropped by the new map.
//! Events against an index that is not `Ready` are dropped: the next full
//! build reads the file anyway.
//!
//! Readers never wait on that mutex. Each incremental update swaps one file's
//! definitions in a single write-locked step (copy-on-write on the shared
//! map), so a lookup sees the file either entirely before or entirely after.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::documents::Documents;
use super::scan::TemplateScanner;
use super::types::MixinDefinition;
use super::Cancelled;

/// Mixin name -> every definition of it in the workspace.
pub type Definitions = HashMap<String, Vec<MixinDefinition>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    NotBuilt,
    Building,
    Ready,
}

/// Answer to [`MixinIndex::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The index is not ready; absence means nothing yet.
    Unknown,
    NotFound,
    Found(Vec<MixinDefinition>),
}

impl Lookup {
    pub fn definitions(&self) -> &[MixinDefinition] {
        match self {
            Lookup::Found(definitions) => definitions,
            Lookup::Unknown | Lookup::NotFound => &[],
        }
    }
}

#[derive(Debug)]
enum State {
    NotBuilt,
    Building { previous: Option<Arc<Definitions>> },
    Ready(Arc<Definitions>),
}

#[derive(Debug)]
pub struct MixinIndex {
    state: RwLock<State>,
    writer: tokio::sync::Mutex<()>,
    documents: Documents,
    scanner: Arc<dyn TemplateScanner>,
}

impl MixinIndex {
    pub fn new(documents: Documents, scanner: Arc<dyn TemplateScanner>) -> Self {
        Self {
            state: RwLock::new(State::NotBuilt),
            writer: tokio::sync::Mutex::new(()),
            documents,
            scanner,
        }
    }

    pub fn phase(&self) -> IndexPhase {
        match &*self.state.read() {
            State::NotBuilt => IndexPhase::NotBuilt,
            State::Building { .. } => IndexPhase::Building,
            State::Ready(_) => IndexPhase::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == IndexPhase::Ready
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        match &*self.state.read() {
            State::NotBuilt | State::Building { .. } => Lookup::Unknown,
            State::Ready(definitions) => match definitions.get(name) {
                Some(found) if !found.is_empty() => Lookup::Found(found.clone()),
                _ => Lookup::NotFound,
            },
        }
    }

    /// The published map, if the index is ready.
    pub fn snapshot(&self) -> Option<Arc<Definitions>> {
        match &*self.state.read() {
            State::Ready(definitions) => Some(definitions.clone()),
            State::NotBuilt | State::Building { .. } => None,
        }
    }

    /// Sorted mixin names, if the index is ready.
    pub fn names(&self) -> Option<Vec<String>> {
        let snapshot = self.snapshot()?;
        let mut names: Vec<String> = snapshot.keys().cloned().collect();
        names.sort();
        Some(names)
    }

    /// Replaces the whole index with the definitions found in `files`.
    ///
    /// Unreadable or unscannable files are logged and contribute nothing.
    /// On cancellation the previous state is put back and nothing of the
    /// new build is published.
    pub async fn build_full(
        &self,
        files: Vec<PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<usize, Cancelled> {
        self.build_discovered(move || files, cancel).await
    }

    /// Same as [`MixinIndex::build_full`], with the file list produced by
    /// `discover` on the blocking pool after the mutation lock is taken.
    pub async fn build_discovered<F>(
        &self,
        discover: F,
        cancel: &CancellationToken,
    ) -> Result<usize, Cancelled>
    where
        F: FnOnce() -> Vec<PathBuf> + Send + 'static,
    {
        let _writer = self.writer.lock().await;

        let pending = PendingBuild::start(self);
        let files = match tokio::task::spawn_blocking(discover).await {
            Ok(files) => files,
            Err(err) => {
                warn!(%err, "template discovery failed");
                vec![]
            }
        };
        let mut definitions = Definitions::new();
        let mut count = 0;

        for file in &files {
            if cancel.is_cancelled() {
                debug!(files = files.len(), "mixin index build cancelled");
                return Err(Cancelled);
            }
            for definition in self.parse_file(file).await {
                definitions
                    .entry(definition.name.clone())
                    .or_default()
                    .push(definition);
                count += 1;
            }
        }

        info!(
            files = files.len(),
            definitions = count,
            names = definitions.len(),
            "mixin index ready"
        );
        pending.commit(definitions);
        Ok(count)
    }

    pub async fn on_file_changed(&self, path: &Path) {
        self.reindex(path).await
    }

    pub async fn on_file_created(&self, path: &Path) {
        self.reindex(path).await
    }

    pub async fn on_file_deleted(&self, path: &Path) {
        let _writer = self.writer.lock().await;

        let mut state = self.state.write();
        match &mut *state {
            State::Ready(definitions) => purge(Arc::make_mut(definitions), path),
            State::NotBuilt | State::Building { .. } => {
                debug!(path = %path.display(), "index not ready, delete ignored")
            }
        }
    }

    async fn reindex(&self, path: &Path) {
        let _writer = self.writer.lock().await;

        if !self.is_ready() {
            debug!(path = %path.display(), "index not ready, update ignored");
            return;
        }

        let fresh = self.parse_file(path).await;

        let mut state = self.state.write();
        if let State::Ready(definitions) = &mut *state {
            let definitions = Arc::make_mut(definitions);
            purge(definitions, path);
            for definition in fresh {
                definitions
                    .entry(definition.name.clone())
                    .or_default()
                    .push(definition);
            }
        }
    }

    async fn parse_file(&self, path: &Path) -> Vec<MixinDefinition> {
        let text = match self.documents.read(path).await {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read template");
                return vec![];
            }
        };

        match self.scanner.scan(path, &text) {
            Ok(file) => file.mixins,
            Err(err) => {
                warn!(%err, "could not scan template");
                vec![]
            }
        }
    }
}

/// Drops every definition contributed by `path`; names left without
/// definitions disappear entirely.
fn purge(definitions: &mut Definitions, path: &Path) {
    definitions.retain(|_, defs| {
        defs.retain(|def| def.path != path);
        !defs.is_empty()
    });
}

/// Puts the previous state back unless the build is committed, including
/// when the build future is dropped half way.
struct PendingBuild<'a> {
    index: &'a MixinIndex,
    previous: Option<Option<Arc<Definitions>>>,
}

impl<'a> PendingBuild<'a> {
    fn start(index: &'a MixinIndex) -> Self {
        let mut state = index.state.write();
        let previous = match std::mem::replace(&mut *state, State::NotBuilt) {
            State::Ready(definitions) => Some(definitions),
            State::Building { previous } => previous,
            State::NotBuilt => None,
        };
        *state = State::Building {
            previous: previous.clone(),
        };

        Self {
            index,
            previous: Some(previous),
        }
    }

    fn commit(mut self, definitions: Definitions) {
        self.previous = None;
        *self.index.state.write() = State::Ready(Arc::new(definitions));
    }
}

impl Drop for PendingBuild<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.index.state.write() = match previous {
                Some(definitions) => State::Ready(definitions),
                None => State::NotBuilt,
            };
        }
    }
}
