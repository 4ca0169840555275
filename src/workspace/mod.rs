//! The template workspace: roots, open documents and the cross-file engine.
//!
//! [`Workspace`] is constructed once per session and handed by reference to
//! every feature. It owns the [`PathResolver`], the [`MixinIndex`] and the
//! scanner backend; reference graphs are computed on demand from it.

mod documents;
mod graph;
mod index;
mod path;
mod scan;
mod types;

#[cfg(test)]
mod tests;

pub use documents::Documents;
pub use graph::{all_referenced_files, direct_references, DependencyGraph, ReferenceGraph};
pub use index::{Definitions, IndexPhase, Lookup, MixinIndex};
pub use path::{normalize, PathResolver};
pub use scan::{is_mixin_name, parse_parameters, LexicalScanner, ScanError, TemplateScanner};
pub use types::{
    byte_offset, file_location, strip_quotes, utf16_column, BlockDefinition, Directive,
    DirectiveKind, MixinCall, MixinDefinition, MyRange, Rangeable, TemplateFile,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use pathdiff::diff_paths;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Settings;

/// Returned when a caller abandons a traversal or a full index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// A filesystem change reported by the editor's file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Changed(PathBuf),
    Deleted(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Created(path) | FileEvent::Changed(path) | FileEvent::Deleted(path) => path,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    settings: Settings,
    roots: Vec<PathBuf>,
    documents: Documents,
    scanner: Arc<dyn TemplateScanner>,
    resolver: PathResolver,
    index: MixinIndex,
}

impl Workspace {
    pub fn new(settings: Settings, roots: Vec<PathBuf>) -> Workspace {
        Self::with_scanner(settings, roots, Arc::new(LexicalScanner))
    }

    pub fn with_scanner(
        settings: Settings,
        roots: Vec<PathBuf>,
        scanner: Arc<dyn TemplateScanner>,
    ) -> Workspace {
        let roots: Vec<PathBuf> = roots.iter().map(|root| normalize(root)).collect();
        let documents = Documents::new();

        Workspace {
            resolver: PathResolver::new(roots.clone(), &settings),
            index: MixinIndex::new(documents.clone(), scanner.clone()),
            settings,
            roots,
            documents,
            scanner,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    pub fn scanner(&self) -> &dyn TemplateScanner {
        self.scanner.as_ref()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn index(&self) -> &MixinIndex {
        &self.index
    }

    /// `path` relative to the first root containing it.
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .find(|root| path.starts_with(root))
            .and_then(|root| diff_paths(path, root))
    }

    /// Has the template extension and lies outside every excluded directory.
    pub fn is_template(&self, path: &Path) -> bool {
        is_template(&self.settings, path)
    }

    /// Every template under the roots, sorted, hidden and excluded
    /// directories skipped.
    pub fn template_files(&self) -> Vec<PathBuf> {
        template_files(&self.settings, &self.roots)
    }

    /// Discovers the workspace's templates and runs a full index build.
    pub async fn build_index(&self, cancel: &CancellationToken) -> Result<usize, Cancelled> {
        let settings = self.settings.clone();
        let roots = self.roots.clone();
        self.index
            .build_discovered(move || template_files(&settings, &roots), cancel)
            .await
    }

    /// Forwards a filesystem event to the index. Non-template paths are ignored.
    pub async fn handle_event(&self, event: FileEvent) {
        if !self.is_template(event.path()) {
            debug!(path = %event.path().display(), "ignoring non-template event");
            return;
        }

        match event {
            FileEvent::Created(path) => self.index.on_file_created(&normalize(&path)).await,
            FileEvent::Changed(path) => self.index.on_file_changed(&normalize(&path)).await,
            FileEvent::Deleted(path) => self.index.on_file_deleted(&normalize(&path)).await,
        }
    }

    /// Scans already loaded text; a scanner failure is logged and yields `None`.
    pub fn scan_text(&self, path: &Path, text: &str) -> Option<TemplateFile> {
        self.scanner
            .scan(path, text)
            .inspect_err(|err| warn!(%err, "could not scan template"))
            .ok()
    }

    /// Reads and scans one document; unreadable documents are logged and yield `None`.
    pub async fn scan(&self, path: &Path) -> Option<TemplateFile> {
        match self.documents.read(path).await {
            Ok(text) => self.scan_text(path, &text),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read template");
                None
            }
        }
    }

    pub fn scan_blocking(&self, path: &Path) -> Option<TemplateFile> {
        match self.documents.read_blocking(path) {
            Ok(text) => self.scan_text(path, &text),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read template");
                None
            }
        }
    }

    /// Scans every template in parallel. Blocking; failed files are left out.
    pub fn scan_all(&self) -> Vec<TemplateFile> {
        self.template_files()
            .par_iter()
            .filter_map(|path| self.scan_blocking(path))
            .collect()
    }

    /// Every directive in the workspace that resolves to `path`, or would
    /// resolve to it if it still existed.
    pub fn directives_targeting(&self, path: &Path) -> Vec<Directive> {
        let path = normalize(path);
        self.scan_all()
            .into_iter()
            .flat_map(|file| file.directives)
            .filter(|directive| {
                self.resolver
                    .targets_blocking(&directive.raw_target, &directive.source, &path)
            })
            .collect()
    }
}

fn is_template(settings: &Settings, path: &Path) -> bool {
    let extension = settings.extension.trim_start_matches('.');
    path.extension().and_then(|e| e.to_str()) == Some(extension)
        && !path.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| settings.exclude_dirs.iter().any(|dir| dir == name))
        })
}

fn template_files(settings: &Settings, roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .flat_map(|root| {
            WalkDir::new(root)
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0
                        || !e
                            .file_name()
                            .to_str()
                            .map(|s| s.starts_with('.') || settings.exclude_dirs.iter().any(|d| d == s))
                            .unwrap_or(false)
                })
                .flatten()
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| normalize(entry.path()))
        .filter(|path| is_template(settings, path))
        .sorted()
        .dedup()
        .collect()
}
