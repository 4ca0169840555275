//! Mixin index lifecycle through workspace events.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::test_utils::{create_ready_workspace, create_test_workspace};
use crate::workspace::{Definitions, FileEvent, IndexPhase, Lookup, MixinDefinition};

fn sorted(definitions: &Definitions) -> HashMap<String, Vec<MixinDefinition>> {
    definitions
        .iter()
        .map(|(name, defs)| {
            let mut defs = defs.clone();
            defs.sort_by(|a, b| a.path.cmp(&b.path).then(a.range.start.line.cmp(&b.range.start.line)));
            (name.clone(), defs)
        })
        .collect()
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (_temp_dir, _dir, workspace) = create_ready_workspace(&[
        ("a.pug", "mixin card(title)\nmixin nav"),
        ("b.pug", "mixin card\n+nav"),
        ("partials/c.pug", "mixin footer(year = 2024)"),
    ])
    .await;

    let first = workspace.index().snapshot().unwrap();
    workspace
        .build_index(&CancellationToken::new())
        .await
        .unwrap();
    let second = workspace.index().snapshot().unwrap();

    assert_eq!(sorted(&first), sorted(&second));
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn test_change_drops_removed_definitions() {
    let (_temp_dir, dir, workspace) =
        create_ready_workspace(&[("a.pug", "mixin x\nmixin y"), ("b.pug", "mixin x")]).await;
    let a = dir.join("a.pug");

    fs::write(&a, "p spacer\nmixin x(label)").unwrap();
    workspace.handle_event(FileEvent::Changed(a.clone())).await;

    let index = workspace.index();
    assert_eq!(index.lookup("y"), Lookup::NotFound);

    let x = index.lookup("x");
    assert_eq!(x.definitions().len(), 2);
    let from_a: Vec<_> = x.definitions().iter().filter(|d| d.path == a).collect();
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].range.start.line, 1);
    assert_eq!(from_a[0].parameters, vec!["label"]);
}

#[tokio::test]
async fn test_delete_removes_key() {
    let (_temp_dir, dir, workspace) =
        create_ready_workspace(&[("z.pug", "mixin z"), ("other.pug", "mixin other")]).await;
    let z = dir.join("z.pug");

    fs::remove_file(&z).unwrap();
    workspace.handle_event(FileEvent::Deleted(z)).await;

    assert_eq!(workspace.index().lookup("z"), Lookup::NotFound);
    assert_eq!(workspace.index().names(), Some(vec!["other".to_string()]));
}

#[tokio::test]
async fn test_same_name_in_two_files() {
    let (_temp_dir, dir, workspace) =
        create_ready_workspace(&[("a.pug", "mixin card"), ("b.pug", "  mixin card(x)")]).await;

    let mut paths: Vec<_> = workspace
        .index()
        .lookup("card")
        .definitions()
        .iter()
        .map(|d| d.path.clone())
        .collect();
    paths.sort();

    assert_eq!(paths, vec![dir.join("a.pug"), dir.join("b.pug")]);
}

#[tokio::test]
async fn test_created_file_is_merged() {
    let (_temp_dir, dir, workspace) = create_ready_workspace(&[("a.pug", "mixin a")]).await;

    fs::write(dir.join("new.pug"), "mixin fresh").unwrap();
    workspace
        .handle_event(FileEvent::Created(dir.join("new.pug")))
        .await;

    assert_eq!(workspace.index().lookup("fresh").definitions().len(), 1);
}

#[tokio::test]
async fn test_non_template_events_are_ignored() {
    let (_temp_dir, dir, workspace) = create_ready_workspace(&[("a.pug", "mixin a")]).await;

    fs::write(dir.join("notes.txt"), "mixin sneaky").unwrap();
    workspace
        .handle_event(FileEvent::Created(dir.join("notes.txt")))
        .await;
    fs::create_dir_all(dir.join("node_modules/pkg")).unwrap();
    fs::write(dir.join("node_modules/pkg/x.pug"), "mixin vendored").unwrap();
    workspace
        .handle_event(FileEvent::Created(dir.join("node_modules/pkg/x.pug")))
        .await;

    assert_eq!(workspace.index().lookup("sneaky"), Lookup::NotFound);
    assert_eq!(workspace.index().lookup("vendored"), Lookup::NotFound);
}

#[tokio::test]
async fn test_build_skips_excluded_dirs() {
    let (_temp_dir, _dir, workspace) = create_ready_workspace(&[
        ("a.pug", "mixin mine"),
        ("node_modules/lib/b.pug", "mixin theirs"),
        (".cache/c.pug", "mixin hidden"),
    ])
    .await;

    assert_eq!(workspace.index().names(), Some(vec!["mine".to_string()]));
}

#[tokio::test]
async fn test_unknown_until_built() {
    let (_temp_dir, _dir, workspace) = create_test_workspace(&[("a.pug", "mixin a")]);

    assert_eq!(workspace.index().phase(), IndexPhase::NotBuilt);
    assert_eq!(workspace.index().lookup("a"), Lookup::Unknown);
    assert_eq!(workspace.index().lookup("nope"), Lookup::Unknown);

    workspace
        .build_index(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(workspace.index().phase(), IndexPhase::Ready);
    assert_eq!(workspace.index().lookup("nope"), Lookup::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_racing_build_is_not_duplicated() {
    let files: Vec<(String, String)> = (0..200)
        .map(|i| (format!("f{i}.pug"), format!("mixin m{i}")))
        .collect();
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, text)| (name.as_str(), text.as_str()))
        .collect();
    let (_temp_dir, dir, workspace) = create_test_workspace(&borrowed);
    let workspace = Arc::new(workspace);
    fs::write(dir.join("late.pug"), "mixin late").unwrap();

    let build = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.build_index(&CancellationToken::new()).await })
    };

    // waits for the build if it already started; dropped if it has not
    workspace
        .handle_event(FileEvent::Created(dir.join("late.pug")))
        .await;

    build.await.unwrap().unwrap();

    // picked up once, never duplicated by the event
    assert_eq!(workspace.index().lookup("late").definitions().len(), 1);
    assert_eq!(workspace.index().lookup("m199").definitions().len(), 1);
}

#[tokio::test]
async fn test_file_created_during_discovery_survives_rebuild() {
    let (_temp_dir, dir, workspace) = create_ready_workspace(&[("a.pug", "mixin a")]).await;
    let late = dir.join("late.pug");

    // the listing is taken before late.pug exists
    let stale = workspace.template_files();
    let (listed_tx, listed_rx) = tokio::sync::oneshot::channel();
    let (resume_tx, resume_rx) = std::sync::mpsc::channel::<()>();

    let cancel = CancellationToken::new();
    let build = workspace.index().build_discovered(
        move || {
            let _ = listed_tx.send(());
            let _ = resume_rx.recv();
            stale
        },
        &cancel,
    );
    let event = async {
        listed_rx.await.unwrap();
        fs::write(&late, "mixin late").unwrap();
        workspace
            .handle_event(FileEvent::Created(late.clone()))
            .await;
    };
    let release = async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        resume_tx.send(()).unwrap();
    };

    let (built, (), ()) = tokio::join!(build, event, release);
    built.unwrap();

    assert_eq!(workspace.index().lookup("late").definitions().len(), 1);
    assert_eq!(workspace.index().lookup("a").definitions().len(), 1);
}
