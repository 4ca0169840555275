use std::path::Path;

use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Location, Position};
use tracing::debug;

use crate::workspace::{all_referenced_files, file_location, Lookup, Workspace};

/// Definition location(s) for whatever is under the cursor.
///
/// The checks run in a fixed order: an `include`/`extends` line, then a
/// `+name` call, then a `mixin name` declaration. A call is answered from
/// the mixin index when it is ready and knows the name, then from the
/// current document, then from every document it transitively references.
pub async fn goto_definition(
    workspace: &Workspace,
    path: &Path,
    cursor_position: Position,
    cancel: &CancellationToken,
) -> Option<Vec<Location>> {
    let file = workspace.scan(path).await?;

    if let Some(directive) = file.directive_on_line(cursor_position.line) {
        let target = workspace
            .resolver()
            .resolve(directive.target(), path)
            .await?;
        return Some(vec![file_location(&target)?]);
    }

    if let Some(call) = file.call_at(cursor_position) {
        if let Lookup::Found(definitions) = workspace.index().lookup(&call.name) {
            return Some(definitions.iter().filter_map(|d| d.location()).collect());
        }

        if let Some(local) = file.mixins_named(&call.name).next() {
            return Some(vec![local.location()?]);
        }

        let referenced = match all_referenced_files(workspace, path, cancel).await {
            Ok(referenced) => referenced,
            Err(cancelled) => {
                debug!(%cancelled, "definition request abandoned");
                return None;
            }
        };

        let mut locations = Vec::new();
        for document in referenced {
            if cancel.is_cancelled() {
                return None;
            }
            let Some(other) = workspace.scan(&document).await else {
                continue;
            };
            locations.extend(
                other
                    .mixins_named(&call.name)
                    .filter_map(|definition| definition.location()),
            );
        }

        return (!locations.is_empty()).then_some(locations);
    }

    // a declaration is its own definition
    let definition = file.mixin_at(cursor_position)?;
    Some(vec![definition.location()?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_ready_workspace, create_test_workspace};
    use tower_lsp::lsp_types::Url;

    async fn definitions(workspace: &Workspace, path: &Path, line: u32, character: u32) -> Option<Vec<Location>> {
        goto_definition(
            workspace,
            path,
            Position { line, character },
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_call_resolves_through_extends() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("layout.pug", "mixin nav\n  ul"),
            ("page.pug", "extends layout\n+nav"),
        ]);

        let locations = definitions(&workspace, &dir.join("page.pug"), 1, 2)
            .await
            .expect("nav should resolve");

        assert_eq!(locations.len(), 1);
        assert_eq!(
            locations[0].uri,
            Url::from_file_path(dir.join("layout.pug")).unwrap()
        );
        assert_eq!(locations[0].range.start, Position::new(0, 6));
    }

    #[tokio::test]
    async fn test_directive_jumps_to_file_start() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("partials/nav.pug", "nav"),
            ("page.pug", "div\n  include 'partials/nav'"),
        ]);

        // anywhere on the line counts, even the keyword
        let locations = definitions(&workspace, &dir.join("page.pug"), 1, 3)
            .await
            .unwrap();

        assert_eq!(
            locations,
            vec![file_location(&dir.join("partials/nav.pug")).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_unresolved_directive_is_none() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[("a.pug", "include ./missing")]);
        assert_eq!(definitions(&workspace, &dir.join("a.pug"), 0, 10).await, None);
    }

    #[tokio::test]
    async fn test_ready_index_returns_every_definition() {
        let (_temp_dir, dir, workspace) = create_ready_workspace(&[
            ("a.pug", "mixin card"),
            ("b.pug", "mixin card(title)"),
            ("page.pug", "mixin card\n+card('x')"),
        ])
        .await;

        let locations = definitions(&workspace, &dir.join("page.pug"), 1, 1)
            .await
            .unwrap();

        // the index wins over the local definition
        assert_eq!(locations.len(), 3);
    }

    #[tokio::test]
    async fn test_two_definitions_through_references() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("a.pug", "mixin card"),
            ("b.pug", "mixin card"),
            ("page.pug", "include a\ninclude b\n+card"),
        ]);

        let locations = definitions(&workspace, &dir.join("page.pug"), 2, 3)
            .await
            .unwrap();

        let uris: Vec<_> = locations.iter().map(|l| l.uri.clone()).collect();
        assert_eq!(
            uris,
            vec![
                Url::from_file_path(dir.join("a.pug")).unwrap(),
                Url::from_file_path(dir.join("b.pug")).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_definition_before_references() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("layout.pug", "mixin nav"),
            ("page.pug", "extends layout\nmixin nav\n  ul\n+nav"),
        ]);
        let page = dir.join("page.pug");

        let locations = definitions(&workspace, &page, 3, 1).await.unwrap();

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri, Url::from_file_path(&page).unwrap());
        assert_eq!(locations[0].range.start.line, 1);
    }

    #[tokio::test]
    async fn test_ready_index_miss_falls_back() {
        let (_temp_dir, dir, workspace) =
            create_ready_workspace(&[("page.pug", "+later")]).await;
        let page = dir.join("page.pug");

        // an unsaved buffer defines the mixin the index has not seen yet
        workspace
            .documents()
            .open(page.clone(), "mixin later\n+later");

        let locations = definitions(&workspace, &page, 1, 2).await.unwrap();
        assert_eq!(locations[0].range.start, Position::new(0, 6));
    }

    #[tokio::test]
    async fn test_definition_is_its_own_target() {
        let (_temp_dir, dir, workspace) =
            create_test_workspace(&[("a.pug", "p\n  mixin button(label)")]);

        let locations = definitions(&workspace, &dir.join("a.pug"), 1, 12)
            .await
            .unwrap();

        assert_eq!(locations[0].range.start, Position::new(1, 8));
        assert_eq!(locations[0].range.end, Position::new(1, 14));
    }

    #[tokio::test]
    async fn test_unknown_mixin_and_plain_text() {
        let (_temp_dir, dir, workspace) =
            create_test_workspace(&[("a.pug", "+ghost\np plain text")]);
        let a = dir.join("a.pug");

        assert_eq!(definitions(&workspace, &a, 0, 2).await, None);
        assert_eq!(definitions(&workspace, &a, 1, 3).await, None);
    }

    #[tokio::test]
    async fn test_cancelled_traversal_is_none() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("layout.pug", "mixin nav"),
            ("page.pug", "extends layout\n+nav"),
        ]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = goto_definition(&workspace, &dir.join("page.pug"), Position::new(1, 2), &cancel).await;
        assert_eq!(result, None);
    }
}
