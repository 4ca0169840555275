//! Integration tests for the pugls library public API.
//!
//! These exercise the engine the way an external consumer would, through
//! `pugls::workspace` only, against real files in a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Position, Url};

use pugls::config::Settings;
use pugls::gotodef::goto_definition;
use pugls::workspace::{all_referenced_files, FileEvent, Lookup, Workspace};

/// Helper: Create a temporary workspace directory holding `files`.
///
/// Returns (TempDir, PathBuf) - keep TempDir alive for test duration.
fn create_workspace_dir(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path().join("workspace");
    fs::create_dir(&dir).expect("Failed to create workspace subdirectory");
    for (relative, content) in files {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    (temp_dir, dir)
}

fn workspace(dir: &Path) -> Workspace {
    Workspace::new(Settings::default(), vec![dir.to_path_buf()])
}

#[tokio::test]
async fn test_definition_through_extends() {
    let (_temp_dir, dir) = create_workspace_dir(&[
        ("layout.pug", "mixin nav\n  ul"),
        ("page.pug", "extends layout\n+nav"),
    ]);
    let workspace = workspace(&dir);

    let locations = goto_definition(
        &workspace,
        &dir.join("page.pug"),
        Position::new(1, 2),
        &CancellationToken::new(),
    )
    .await
    .expect("nav is defined in the layout");

    assert_eq!(locations.len(), 1);
    assert_eq!(
        locations[0].uri,
        Url::from_file_path(dir.join("layout.pug")).unwrap()
    );
    assert_eq!(locations[0].range.start, Position::new(0, 6));
}

#[tokio::test]
async fn test_missing_include() {
    let (_temp_dir, dir) = create_workspace_dir(&[("a.pug", "include ./missing")]);
    let workspace = workspace(&dir);
    let a = dir.join("a.pug");

    let files = all_referenced_files(&workspace, &a, &CancellationToken::new())
        .await
        .unwrap();

    assert!(files.is_empty());
    assert_eq!(workspace.resolver().resolve("./missing", &a).await, None);
}

#[tokio::test]
async fn test_created_file_becomes_reachable() {
    let (_temp_dir, dir) = create_workspace_dir(&[("a.pug", "include b")]);
    let workspace = workspace(&dir);
    workspace
        .build_index(&CancellationToken::new())
        .await
        .unwrap();
    let a = dir.join("a.pug");

    fs::write(dir.join("b.pug"), "mixin fromB").unwrap();
    workspace
        .handle_event(FileEvent::Created(dir.join("b.pug")))
        .await;

    let files = all_referenced_files(&workspace, &a, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(files, vec![dir.join("b.pug")]);
    assert!(matches!(workspace.index().lookup("fromB"), Lookup::Found(defs) if defs.len() == 1));
}

#[tokio::test]
async fn test_two_definitions_from_index() {
    let (_temp_dir, dir) = create_workspace_dir(&[
        ("a.pug", "mixin card"),
        ("b.pug", "mixin card"),
        ("page.pug", "+card"),
    ]);
    let workspace = workspace(&dir);
    assert_eq!(workspace.index().lookup("card"), Lookup::Unknown);

    workspace
        .build_index(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(workspace.index().lookup("card").definitions().len(), 2);

    let locations = goto_definition(
        &workspace,
        &dir.join("page.pug"),
        Position::new(0, 2),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(locations.len(), 2);
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.extension, "pug");
    assert_eq!(settings.app_dir, "app");
    assert!(settings.unresolved_diagnostics);
}
