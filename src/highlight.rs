use std::path::Path;

use tower_lsp::lsp_types::{DocumentHighlight, DocumentHighlightKind, Position};

use crate::workspace::{MyRange, Workspace};

/// Same-file occurrences of the mixin or block under the cursor.
///
/// Mixin declarations are writes and `+calls` reads. Every `block name`
/// line is a write, since each one defines or overrides the block.
pub fn document_highlight(
    workspace: &Workspace,
    cursor_position: Position,
    path: &Path,
) -> Option<Vec<DocumentHighlight>> {
    let file = workspace.scan_blocking(path)?;

    if let Some((name, _)) = file.mixin_name_at(cursor_position) {
        let definitions = file
            .mixins_named(name)
            .map(|definition| highlight(definition.range, DocumentHighlightKind::WRITE));
        let calls = file
            .calls
            .iter()
            .filter(|call| call.name == name)
            .map(|call| highlight(call.range, DocumentHighlightKind::READ));

        let mut highlights: Vec<DocumentHighlight> = definitions.chain(calls).collect();
        highlights.sort_by_key(|h| (h.range.start.line, h.range.start.character));
        return Some(highlights);
    }

    let block = file.block_at(cursor_position)?;
    Some(
        file.blocks
            .iter()
            .filter(|other| other.name == block.name)
            .map(|other| highlight(other.range, DocumentHighlightKind::WRITE))
            .collect(),
    )
}

fn highlight(range: MyRange, kind: DocumentHighlightKind) -> DocumentHighlight {
    DocumentHighlight {
        range: *range,
        kind: Some(kind),
    }
}
