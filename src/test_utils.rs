//! Shared test utilities for pugls.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::workspace::Workspace;

/// Creates a temporary workspace directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the workspace subdirectory
///
/// Template discovery skips hidden directories, and temp directories can
/// live under paths like `/tmp/.tmpXXXXX`, so the files go in a non-hidden
/// `workspace` subdirectory.
///
/// # Example
///
/// ```ignore
/// use crate::test_utils::create_test_workspace_dir;
///
/// let (_temp_dir, dir) = create_test_workspace_dir();
/// std::fs::write(dir.join("page.pug"), "extends layout").unwrap();
/// ```
pub fn create_test_workspace_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let workspace_dir = temp_dir.path().join("workspace");
    fs::create_dir(&workspace_dir).expect("Failed to create workspace subdirectory");
    (temp_dir, workspace_dir)
}

/// Writes `files` (relative path, content) under `dir`, creating parents.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write test file");
    }
}

/// Creates a workspace over a temp directory holding `files`, with default
/// settings. The mixin index is left unbuilt.
pub fn create_test_workspace(files: &[(&str, &str)]) -> (TempDir, PathBuf, Workspace) {
    let (temp_dir, dir) = create_test_workspace_dir();
    write_files(&dir, files);
    let workspace = Workspace::new(Settings::default(), vec![dir.clone()]);
    (temp_dir, dir, workspace)
}

/// Same as [`create_test_workspace`] with the mixin index built.
pub async fn create_ready_workspace(files: &[(&str, &str)]) -> (TempDir, PathBuf, Workspace) {
    let (temp_dir, dir, workspace) = create_test_workspace(files);
    workspace
        .build_index(&CancellationToken::new())
        .await
        .expect("Index build should not be cancelled");
    (temp_dir, dir, workspace)
}
