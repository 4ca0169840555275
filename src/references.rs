use std::path::Path;

use itertools::Itertools;
use tower_lsp::lsp_types::{Location, Position, Url};

use crate::workspace::{MyRange, TemplateFile, Workspace};

/// Every use of the mixin or template under the cursor.
///
/// On a mixin call or definition this is every `+name` call in the workspace,
/// plus the definitions when `include_declaration` is set. On an
/// `include`/`extends` line it is every directive resolving to the same file.
/// Blocking: scans the whole workspace.
pub fn references(
    workspace: &Workspace,
    cursor_position: Position,
    path: &Path,
    include_declaration: bool,
) -> Option<Vec<Location>> {
    let file = workspace.scan_blocking(path)?;

    if let Some(directive) = file.directive_on_line(cursor_position.line) {
        let target = workspace
            .resolver()
            .resolve_blocking(&directive.raw_target, path)?;

        return Some(
            workspace
                .directives_targeting(&target)
                .iter()
                .filter_map(|directive| location(&directive.source, &directive.range))
                .collect(),
        );
    }

    let (name, _) = file.mixin_name_at(cursor_position)?;
    Some(mixin_references(
        &workspace.scan_all(),
        name,
        include_declaration,
    ))
}

fn mixin_references(files: &[TemplateFile], name: &str, include_declaration: bool) -> Vec<Location> {
    files
        .iter()
        .flat_map(|file| {
            let calls = file
                .calls
                .iter()
                .filter(|call| call.name == name)
                .map(|call| call.range);
            let definitions = file
                .mixins_named(name)
                .filter(|_| include_declaration)
                .map(|definition| definition.range);

            definitions
                .chain(calls)
                .map(|range| (file.path.as_path(), range))
                .collect_vec()
        })
        .filter_map(|(path, range)| location(path, &range))
        .collect()
}

fn location(path: &Path, range: &MyRange) -> Option<Location> {
    Some(Location {
        uri: Url::from_file_path(path).ok()?,
        range: **range,
    })
}
