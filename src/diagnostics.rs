use std::path::Path;

use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};

use crate::workspace::{normalize, Directive, ReferenceGraph, Workspace};

/// Problems with the `include`/`extends` directives of one document:
/// targets that resolve to no file, and targets that lead back to the
/// document through a cycle.
///
/// `None` when both kinds are disabled, the document cannot be read, or the
/// request was cancelled.
pub async fn diagnostics(
    workspace: &Workspace,
    path: &Path,
    cancel: &CancellationToken,
) -> Option<Vec<Diagnostic>> {
    let settings = workspace.settings();
    if !settings.unresolved_diagnostics && !settings.cycle_diagnostics {
        return None;
    }

    let path = normalize(path);
    let file = workspace.scan(&path).await?;

    let mut resolved = Vec::new();
    let mut diags = Vec::new();
    for directive in &file.directives {
        match workspace.resolver().resolve(directive.target(), &path).await {
            Some(target) => resolved.push((directive, target)),
            None if settings.unresolved_diagnostics => {
                diags.push(unresolved_diagnostic(directive));
            }
            None => {}
        }
    }

    if settings.cycle_diagnostics && !resolved.is_empty() {
        let graph = ReferenceGraph::build(workspace, &path, cancel).await.ok()?;
        for (directive, target) in resolved {
            if let Some(cycle) = graph.cycle_through(&path, &target) {
                diags.push(cycle_diagnostic(directive, &cycle));
            }
        }
    }

    Some(diags)
}

fn unresolved_diagnostic(directive: &Directive) -> Diagnostic {
    Diagnostic {
        range: *directive.range,
        message: format!(
            "Unresolved {} target '{}'",
            directive.kind.keyword(),
            directive.target()
        ),
        source: Some("pugls".into()),
        severity: Some(DiagnosticSeverity::WARNING),
        ..Default::default()
    }
}

fn cycle_diagnostic(directive: &Directive, cycle: &[std::path::PathBuf]) -> Diagnostic {
    let members = cycle
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy())
        .sorted()
        .join(", ");

    Diagnostic {
        range: *directive.range,
        message: format!(
            "{} of '{}' forms a cycle through: {members}",
            directive.kind.keyword(),
            directive.target()
        ),
        source: Some("pugls".into()),
        severity: Some(DiagnosticSeverity::WARNING),
        ..Default::default()
    }
}
