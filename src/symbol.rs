//! Symbol providers for Pug templates.
//!
//! This module implements LSP symbol capabilities:
//! - `textDocument/documentSymbol` - outline view of current file
//! - `workspace/symbol` - fuzzy search across all files
//!
//! # Document Symbols
//!
//! | Symbol Type | LSP Kind | Example |
//! |-------------|----------|---------|
//! | Mixin definitions | `Function` | `mixin card(title)` |
//! | Blocks | `Module` | `block content` |
//! | Includes | `File` | `include partials/nav` |
//! | Extends | `Interface` | `extends layout` |
//!
//! Symbols are returned in document order (sorted by line number).
//!
//! # Workspace Symbols
//!
//! Mixin and block definitions of every template, ranked by
//! [`nucleo_matcher`] score. The container name is the file's path
//! relative to its workspace root.

use std::path::Path;

use itertools::Itertools;
use nucleo_matcher::{
    pattern::{self, Normalization},
    Matcher,
};
use tower_lsp::lsp_types::{
    DocumentSymbol, DocumentSymbolResponse, Location, Range, SymbolInformation, SymbolKind, Url,
    WorkspaceSymbolParams,
};

use crate::workspace::{DirectiveKind, TemplateFile, Workspace};

fn compute_match_score(
    matcher: &mut Matcher,
    pattern: &pattern::Pattern,
    symbol: SymbolInformation,
) -> (u32, SymbolInformation) {
    let mut buf = Vec::new();
    (
        pattern
            .score(
                nucleo_matcher::Utf32Str::new(symbol.name.as_str(), &mut buf),
                matcher,
            )
            .unwrap_or_default(),
        symbol,
    )
}

/// Search for mixins and blocks across the workspace.
///
/// An empty query lists everything, in file order.
pub fn workspace_symbol(
    workspace: &Workspace,
    params: &WorkspaceSymbolParams,
) -> Option<Vec<SymbolInformation>> {
    let symbols = workspace
        .scan_all()
        .iter()
        .flat_map(|file| symbol_information(workspace, file))
        .collect_vec();

    if params.query.trim().is_empty() {
        return Some(symbols);
    }

    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let pattern = pattern::Pattern::parse(
        &params.query,
        pattern::CaseMatching::Smart,
        Normalization::Smart,
    );

    Some(
        symbols
            .into_iter()
            .map(|symbol| compute_match_score(&mut matcher, &pattern, symbol))
            .filter(|(score, _)| *score > 0)
            .sorted_by(|(a, _), (b, _)| Ord::cmp(b, a))
            .map(|(_score, symbol)| symbol)
            .collect_vec(),
    )
}

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn symbol_information(workspace: &Workspace, file: &TemplateFile) -> Vec<SymbolInformation> {
    let Ok(uri) = Url::from_file_path(&file.path) else {
        return vec![];
    };
    let container_name = workspace
        .relative_path(&file.path)
        .map(|relative| relative.to_string_lossy().into_owned());

    let mixins = file
        .mixins
        .iter()
        .map(|mixin| (mixin.name.clone(), SymbolKind::FUNCTION, *mixin.range));
    let blocks = file
        .blocks
        .iter()
        .map(|block| (block.name.clone(), SymbolKind::MODULE, *block.range));

    mixins
        .chain(blocks)
        .map(|(name, kind, range)| SymbolInformation {
            name,
            kind,
            location: Location {
                uri: uri.clone(),
                range,
            },
            container_name: container_name.clone(),
            deprecated: None,
            tags: None,
        })
        .collect()
}

/// Internal representation of a document symbol for sorting.
#[derive(Debug)]
struct FlatSymbol {
    name: String,
    kind: SymbolKind,
    range: Range,
    detail: Option<String>,
    line: u32,
}

/// Get the outline of a single template.
///
/// `None` if the file cannot be read or declares nothing.
pub fn document_symbol(workspace: &Workspace, path: &Path) -> Option<DocumentSymbolResponse> {
    let file = workspace.scan_blocking(path)?;
    let mut symbols: Vec<FlatSymbol> = Vec::new();

    for mixin in &file.mixins {
        symbols.push(FlatSymbol {
            name: mixin.name.clone(),
            kind: SymbolKind::FUNCTION,
            range: *mixin.range,
            detail: Some(mixin.signature()),
            line: mixin.range.start.line,
        });
    }

    for block in &file.blocks {
        symbols.push(FlatSymbol {
            name: block.name.clone(),
            kind: SymbolKind::MODULE,
            range: *block.range,
            detail: Some("block".to_string()),
            line: block.range.start.line,
        });
    }

    for directive in &file.directives {
        symbols.push(FlatSymbol {
            name: directive.target().to_string(),
            kind: match directive.kind {
                DirectiveKind::Include => SymbolKind::FILE,
                DirectiveKind::Extends => SymbolKind::INTERFACE,
            },
            range: *directive.range,
            detail: Some(directive.kind.keyword().to_string()),
            line: directive.line,
        });
    }

    if symbols.is_empty() {
        return None;
    }

    symbols.sort_by_key(|s| s.line);

    Some(DocumentSymbolResponse::Nested(symbols_to_flat_list(symbols)))
}

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn symbols_to_flat_list(symbols: Vec<FlatSymbol>) -> Vec<DocumentSymbol> {
    symbols
        .into_iter()
        .map(|s| DocumentSymbol {
            name: s.name,
            kind: s.kind,
            range: s.range,
            selection_range: s.range,
            detail: s.detail,
            deprecated: None,
            tags: None,
            children: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_workspace;

    fn query(text: &str) -> WorkspaceSymbolParams {
        WorkspaceSymbolParams {
            query: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_document_outline_in_line_order() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[(
            "page.pug",
            "extends layout\ninclude mixins\nblock content\n  mixin local(a, b = 1)\n    p= a",
        )]);

        let Some(DocumentSymbolResponse::Nested(symbols)) =
            document_symbol(&workspace, &dir.join("page.pug"))
        else {
            panic!("expected nested symbols");
        };

        let outline: Vec<_> = symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            outline,
            vec![
                ("layout", SymbolKind::INTERFACE),
                ("mixins", SymbolKind::FILE),
                ("content", SymbolKind::MODULE),
                ("local", SymbolKind::FUNCTION),
            ]
        );
        assert_eq!(symbols[3].detail.as_deref(), Some("mixin local(a, b)"));
    }

    #[test]
    fn test_document_without_symbols() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[("a.pug", "p just text")]);
        assert!(document_symbol(&workspace, &dir.join("a.pug")).is_none());
    }

    #[test]
    fn test_workspace_symbol_fuzzy_matching() {
        let (_temp_dir, _dir, workspace) = create_test_workspace(&[
            ("mixins/cards.pug", "mixin productCard\nmixin card"),
            ("layout.pug", "block content"),
        ]);

        let result = workspace_symbol(&workspace, &query("card")).unwrap();
        let names: Vec<_> = result.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"card"));
        assert!(names.contains(&"productCard"));
        assert_eq!(result[0].container_name.as_deref(), Some("mixins/cards.pug"));
    }

    #[test]
    fn test_workspace_symbol_empty_query_lists_all() {
        let (_temp_dir, _dir, workspace) = create_test_workspace(&[
            ("a.pug", "mixin one"),
            ("b.pug", "block two"),
        ]);

        let result = workspace_symbol(&workspace, &query("")).unwrap();
        let kinds: Vec<_> = result.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            kinds,
            vec![("one", SymbolKind::FUNCTION), ("two", SymbolKind::MODULE)]
        );
    }
}
