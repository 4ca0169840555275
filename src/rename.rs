use std::path::Path;

use tower_lsp::lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, OptionalVersionedTextDocumentIdentifier,
    Position, PrepareRenameResponse, RenameParams, TextDocumentEdit, TextEdit, Url, WorkspaceEdit,
};

use crate::workspace::{is_mixin_name, TemplateFile, Workspace};

/// The name span of the mixin call or definition under the cursor.
pub fn prepare_rename(
    workspace: &Workspace,
    cursor_position: Position,
    path: &Path,
) -> Option<PrepareRenameResponse> {
    let file = workspace.scan_blocking(path)?;
    let (name, range) = file.mixin_name_at(cursor_position)?;

    Some(PrepareRenameResponse::RangeWithPlaceholder {
        range: *range,
        placeholder: name.to_string(),
    })
}

/// Renames the mixin under the cursor: every definition and call of that
/// name across the workspace, one document edit per file.
///
/// `None` when the cursor is not on a mixin or the new name is not a legal
/// mixin identifier.
pub fn rename(workspace: &Workspace, params: &RenameParams, path: &Path) -> Option<WorkspaceEdit> {
    let position = params.text_document_position.position;
    if !is_mixin_name(&params.new_name) {
        return None;
    }

    let file = workspace.scan_blocking(path)?;
    let (name, _) = file.mixin_name_at(position)?;

    let operations = workspace
        .scan_all()
        .iter()
        .filter_map(|file| file_edit(file, name, &params.new_name))
        .map(DocumentChangeOperation::Edit)
        .collect();

    Some(WorkspaceEdit {
        document_changes: Some(DocumentChanges::Operations(operations)),
        ..Default::default()
    })
}

fn file_edit(file: &TemplateFile, name: &str, new_name: &str) -> Option<TextDocumentEdit> {
    let edits: Vec<OneOf<TextEdit, _>> = file
        .mixins_named(name)
        .map(|definition| definition.range)
        .chain(
            file.calls
                .iter()
                .filter(|call| call.name == name)
                .map(|call| call.range),
        )
        .map(|range| {
            OneOf::Left(TextEdit {
                range: *range,
                new_text: new_name.to_string(),
            })
        })
        .collect();

    if edits.is_empty() {
        return None;
    }

    Some(TextDocumentEdit {
        text_document: OptionalVersionedTextDocumentIdentifier {
            uri: Url::from_file_path(&file.path).ok()?,
            version: None,
        },
        edits,
    })
}
