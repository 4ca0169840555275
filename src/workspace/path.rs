//! Resolution of `include`/`extends` targets to files.
//!
//! Candidate order for a target `t` referenced from `dir/page.pug`:
//!
//! | target | candidates, in order |
//! |--------|----------------------|
//! | `/t` | for each root: `root/t`, `root/t.pug`, `root/app/t`, `root/app/t.pug` |
//! | `t` | `dir/t`, `dir/t.pug`, then for each root: `root/t`, `root/t.pug` |
//!
//! The first candidate that is an existing regular file wins. Nothing is
//! cached; every call goes back to the filesystem.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::Settings;

use super::types::strip_quotes;

#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: Vec<PathBuf>,
    extension: String,
    app_dir: String,
}

impl PathResolver {
    pub fn new(roots: Vec<PathBuf>, settings: &Settings) -> Self {
        Self {
            roots,
            extension: settings.extension.trim_start_matches('.').to_string(),
            app_dir: settings.app_dir.clone(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Every path [`PathResolver::resolve`] would try, in order.
    pub fn candidates(&self, raw_target: &str, referencing: &Path) -> Vec<PathBuf> {
        let target = strip_quotes(raw_target);
        if target.is_empty() {
            return vec![];
        }

        let mut bases = Vec::new();
        match target
            .starts_with('/')
            .then(|| target.trim_start_matches('/'))
        {
            Some(rooted) => {
                for root in &self.roots {
                    bases.push(root.join(rooted));
                    if !self.app_dir.is_empty() {
                        bases.push(root.join(&self.app_dir).join(rooted));
                    }
                }
            }
            None => {
                if let Some(dir) = referencing.parent() {
                    bases.push(dir.join(target));
                }
                bases.extend(self.roots.iter().map(|root| root.join(target)));
            }
        }

        bases
            .into_iter()
            .flat_map(|base| {
                let base = normalize(&base);
                let with_extension = self.append_extension(&base);
                [base, with_extension]
            })
            .collect()
    }

    /// Resolves `raw_target` (quotes allowed) as written in `referencing`.
    pub async fn resolve(&self, raw_target: &str, referencing: &Path) -> Option<PathBuf> {
        for candidate in self.candidates(raw_target, referencing) {
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    /// Blocking variant for rayon workspace scans.
    pub fn resolve_blocking(&self, raw_target: &str, referencing: &Path) -> Option<PathBuf> {
        self.resolve_with(raw_target, referencing, |candidate| candidate.is_file())
    }

    /// Resolves against `exists` instead of the filesystem, e.g. to ask how
    /// a target would resolve once pending file moves are applied.
    pub fn resolve_with(
        &self,
        raw_target: &str,
        referencing: &Path,
        exists: impl Fn(&Path) -> bool,
    ) -> Option<PathBuf> {
        self.candidates(raw_target, referencing)
            .into_iter()
            .find(|candidate| exists(candidate))
    }

    /// Whether `raw_target` in `referencing` resolves to `path`, or would
    /// if `path` existed (used for files that were just deleted).
    pub fn targets_blocking(&self, raw_target: &str, referencing: &Path, path: &Path) -> bool {
        for candidate in self.candidates(raw_target, referencing) {
            if candidate == path {
                return true;
            }
            if candidate.is_file() {
                return false;
            }
        }
        false
    }

    /// `dir/name` -> `dir/name.pug`; appends rather than replacing any extension.
    fn append_extension(&self, path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Lexically removes `.` and `..` so the same file always has the same key.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
