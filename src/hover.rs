//! Hover provider for mixins.
//!
//! On a `+name` call or a `mixin name` declaration the hover shows the
//! signature and every file defining the mixin. Definitions come from the
//! mixin index when it is ready and knows the name, otherwise from the
//! current file.
//!
//! Hover can be disabled via [`Settings::hover`](crate::config::Settings):
//!
//! ```toml
//! hover = false
//! ```

use std::path::Path;

use itertools::Itertools;
use tower_lsp::lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};

use crate::workspace::{Lookup, MixinDefinition, Workspace};

pub fn hover(workspace: &Workspace, params: &HoverParams, path: &Path) -> Option<Hover> {
    if !workspace.settings().hover {
        return None;
    }

    let cursor_position = params.text_document_position_params.position;
    let file = workspace.scan_blocking(path)?;
    let (name, range) = file.mixin_name_at(cursor_position)?;

    let definitions = match workspace.index().lookup(name) {
        Lookup::Found(definitions) => definitions,
        Lookup::Unknown | Lookup::NotFound => file.mixins_named(name).cloned().collect(),
    };
    if definitions.is_empty() {
        return None;
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: preview(workspace, &definitions),
        }),
        range: Some(*range),
    })
}

fn preview(workspace: &Workspace, definitions: &[MixinDefinition]) -> String {
    let signatures = definitions
        .iter()
        .map(MixinDefinition::signature)
        .unique()
        .join("\n");

    let files = definitions
        .iter()
        .map(|definition| {
            let shown = workspace
                .relative_path(&definition.path)
                .unwrap_or_else(|| definition.path.clone());
            format!(
                "- `{}:{}`",
                shown.display(),
                definition.range.start.line + 1
            )
        })
        .join("\n");

    format!("```pug\n{signatures}\n```\n\nDefined in:\n{files}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_utils::{
        create_ready_workspace, create_test_workspace, create_test_workspace_dir, write_files,
    };
    use tower_lsp::lsp_types::{
        Position, TextDocumentIdentifier, TextDocumentPositionParams, Url,
    };

    fn hover_params(path: &Path, line: u32, character: u32) -> HoverParams {
        HoverParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: Url::from_file_path(path).unwrap(),
                },
                position: Position { line, character },
            },
            work_done_progress_params: Default::default(),
        }
    }

    fn markdown(hover: Hover) -> String {
        match hover.contents {
            HoverContents::Markup(markup) => markup.value,
            other => panic!("unexpected hover contents: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hover_on_call_uses_index() {
        let (_temp_dir, dir, workspace) = create_ready_workspace(&[
            ("mixins/card.pug", "p\nmixin card(title, body = '')"),
            ("page.pug", "+card('Hi')"),
        ])
        .await;
        let page = dir.join("page.pug");

        let value = markdown(hover(&workspace, &hover_params(&page, 0, 3), &page).unwrap());

        assert!(value.contains("mixin card(title, body)"));
        assert!(value.contains("`mixins/card.pug:2`"));
    }

    #[test]
    fn test_hover_falls_back_to_local_file() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[("a.pug", "mixin nav\n+nav")]);
        let a = dir.join("a.pug");

        let hover = hover(&workspace, &hover_params(&a, 1, 1), &a).unwrap();
        assert_eq!(hover.range.map(|r| r.start), Some(Position::new(1, 1)));
        assert!(markdown(hover).contains("mixin nav"));
    }

    #[test]
    fn test_hover_unknown_mixin_is_none() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[("a.pug", "+ghost")]);
        let a = dir.join("a.pug");
        assert!(hover(&workspace, &hover_params(&a, 0, 2), &a).is_none());
    }

    #[test]
    fn test_hover_disabled() {
        let (_temp_dir, dir) = create_test_workspace_dir();
        write_files(&dir, &[("a.pug", "mixin nav\n+nav")]);
        let settings = Settings {
            hover: false,
            ..Default::default()
        };
        let workspace = Workspace::new(settings, vec![dir.clone()]);
        let a = dir.join("a.pug");

        assert!(hover(&workspace, &hover_params(&a, 1, 1), &a).is_none());
    }
}
