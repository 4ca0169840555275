//! Keeps `include`/`extends` targets pointing at the right template when
//! files or folders are renamed (`workspace/willRenameFiles`).
//!
//! Every directive is resolved twice: against the workspace as it is, and
//! against the workspace as it will be once the moves are applied. A
//! directive is rewritten only when its target or its own file moves and
//! the text as written would no longer reach the same template. The
//! replacement keeps the directive's spelling where it can: rooted or
//! relative, a leading `./`, an explicit extension and quotes.
//!
//! Edits address documents by their current (pre-rename) URIs, since the
//! client applies them before moving anything.

use std::path::{Path, PathBuf};

use pathdiff::diff_paths;
use tower_lsp::lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, OptionalVersionedTextDocumentIdentifier,
    RenameFilesParams, TextDocumentEdit, TextEdit, Url, WorkspaceEdit,
};
use tracing::debug;

use crate::workspace::{normalize, Directive, TemplateFile, Workspace};

/// Templates about to move, as (current path, path after the rename).
#[derive(Debug, Default)]
struct Moves(Vec<(PathBuf, PathBuf)>);

impl Moves {
    /// A renamed folder moves every template below it.
    fn new(workspace: &Workspace, params: &RenameFilesParams) -> Moves {
        let mut moves = Vec::new();
        let mut templates: Option<Vec<PathBuf>> = None;

        for rename in &params.files {
            let (Some(old), Some(new)) = (file_path(&rename.old_uri), file_path(&rename.new_uri))
            else {
                continue;
            };

            if workspace.is_template(&old) {
                moves.push((old, new));
                continue;
            }

            let templates = templates.get_or_insert_with(|| workspace.template_files());
            for template in templates.iter() {
                if let Ok(rest) = template.strip_prefix(&old) {
                    moves.push((template.clone(), new.join(rest)));
                }
            }
        }

        Moves(moves)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Where `path` will be once the moves are applied.
    fn after(&self, path: &Path) -> PathBuf {
        self.0
            .iter()
            .find(|(old, _)| old == path)
            .map(|(_, new)| new.clone())
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Whether `path` will be a file once the moves are applied.
    fn exists_after(&self, path: &Path) -> bool {
        if self.0.iter().any(|(_, new)| new == path) {
            return true;
        }
        if self.0.iter().any(|(old, _)| old == path) {
            return false;
        }
        path.is_file()
    }
}

pub fn will_rename_files(workspace: &Workspace, params: &RenameFilesParams) -> Option<WorkspaceEdit> {
    let moves = Moves::new(workspace, params);
    if moves.is_empty() {
        return None;
    }
    debug!(moves = moves.0.len(), "updating directives for renamed templates");

    let operations: Vec<DocumentChangeOperation> = workspace
        .scan_all()
        .iter()
        .filter_map(|file| file_edit(workspace, &moves, file))
        .map(DocumentChangeOperation::Edit)
        .collect();

    if operations.is_empty() {
        return None;
    }
    Some(WorkspaceEdit {
        document_changes: Some(DocumentChanges::Operations(operations)),
        ..Default::default()
    })
}

fn file_edit(workspace: &Workspace, moves: &Moves, file: &TemplateFile) -> Option<TextDocumentEdit> {
    let resolver = workspace.resolver();
    let source_after = moves.after(&file.path);

    let edits: Vec<OneOf<TextEdit, _>> = file
        .directives
        .iter()
        .filter_map(|directive| {
            let target = resolver.resolve_blocking(&directive.raw_target, &file.path)?;
            let target_after = moves.after(&target);
            if target_after == target && source_after == file.path {
                return None;
            }

            let still_resolves = resolver
                .resolve_with(&directive.raw_target, &source_after, |p| moves.exists_after(p))
                .is_some_and(|resolved| resolved == target_after);
            if still_resolves {
                return None;
            }

            let new_text = rewrite(workspace, moves, directive, &source_after, &target_after)?;
            Some(OneOf::Left(TextEdit {
                range: *directive.range,
                new_text,
            }))
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

/// A spelling of `target` for `directive` once it lives in `source`, in the
/// directive's current style. `None` when no spelling would resolve to it.
fn rewrite(
    workspace: &Workspace,
    moves: &Moves,
    directive: &Directive,
    source: &Path,
    target: &Path,
) -> Option<String> {
    let written = directive.target();
    let extension = format!(".{}", workspace.resolver().extension());

    let full = if written.starts_with('/') {
        format!("/{}", slashes(&workspace.relative_path(target)?))
    } else {
        let relative = slashes(&diff_paths(target, source.parent()?)?);
        match written.starts_with("./") && !relative.starts_with("../") {
            true => format!("./{relative}"),
            false => relative,
        }
    };
    let bare = full.strip_suffix(&extension).unwrap_or(&full).to_string();

    let spellings = match written.ends_with(&extension) {
        true => [full.clone(), bare],
        false => [bare, full.clone()],
    };
    let spelling = spellings.into_iter().find(|spelling| {
        workspace
            .resolver()
            .resolve_with(spelling, source, |p| moves.exists_after(p))
            .is_some_and(|resolved| resolved == target)
    })?;

    let quote = directive
        .raw_target
        .chars()
        .next()
        .filter(|ch| *ch == '\'' || *ch == '"')
        .or_else(|| spelling.contains(char::is_whitespace).then_some('"'));
    Some(match quote {
        Some(quote) => format!("{quote}{spelling}{quote}"),
        None => spelling,
    })
}

fn file_path(uri: &str) -> Option<PathBuf> {
    let path = Url::parse(uri).ok()?.to_file_path().ok()?;
    Some(normalize(&path))
}

fn slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
