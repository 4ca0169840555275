//! Signature help for mixin calls.
//!
//! Inside the parentheses of a `+name(...)` call the client is shown the
//! mixin's parameters with the one being typed highlighted. Definitions come
//! from the mixin index when it knows the name, otherwise from the current
//! file.

use std::path::Path;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    Documentation, MarkupContent, MarkupKind, ParameterInformation, ParameterLabel, SignatureHelp,
    SignatureHelpParams, SignatureInformation,
};

use crate::workspace::{byte_offset, Lookup, MixinDefinition, Workspace};

static CALL_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\+(?<name>[A-Za-z][A-Za-z0-9_-]*)\s*\(").expect("mixin call open regex")
});

pub fn signature_help(
    workspace: &Workspace,
    params: &SignatureHelpParams,
    path: &Path,
) -> Option<SignatureHelp> {
    let position = params.text_document_position_params.position;
    let line = workspace.documents().line(path, position.line as usize)?;
    let (name, argument) = call_at(&line, byte_offset(&line, position.character))?;

    let definitions = match workspace.index().lookup(name) {
        Lookup::Found(definitions) => definitions,
        Lookup::Unknown | Lookup::NotFound => workspace
            .scan_blocking(path)?
            .mixins_named(name)
            .cloned()
            .collect(),
    };

    let signatures = definitions
        .iter()
        .unique_by(|definition| definition.parameters.clone())
        .map(|definition| signature(workspace, definition, argument))
        .collect_vec();
    let active_parameter = signatures.first()?.active_parameter;

    Some(SignatureHelp {
        signatures,
        active_signature: Some(0),
        active_parameter,
    })
}

fn signature(
    workspace: &Workspace,
    definition: &MixinDefinition,
    argument: usize,
) -> SignatureInformation {
    let shown = workspace
        .relative_path(&definition.path)
        .unwrap_or_else(|| definition.path.clone());

    SignatureInformation {
        label: format!(
            "+{}({})",
            definition.name,
            definition.parameters.join(", ")
        ),
        documentation: Some(Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!(
                "Defined in `{}:{}`",
                shown.display(),
                definition.range.start.line + 1
            ),
        })),
        parameters: Some(
            definition
                .parameters
                .iter()
                .map(|parameter| ParameterInformation {
                    label: ParameterLabel::Simple(parameter.clone()),
                    documentation: None,
                })
                .collect(),
        ),
        // extra arguments land on the last (possibly rest) parameter
        active_parameter: definition
            .parameters
            .len()
            .checked_sub(1)
            .map(|last| argument.min(last) as u32),
    }
}

/// The mixin called on `line` and the index of the argument at byte
/// `cursor`, if the cursor is inside the call's parentheses.
fn call_at(line: &str, cursor: usize) -> Option<(&str, usize)> {
    let captures = CALL_OPEN_RE.captures(line)?;
    let open = captures.get(0)?.end();
    if cursor < open {
        return None;
    }

    let argument = argument_index(line.get(open..cursor)?)?;
    Some((captures.name("name")?.as_str(), argument))
}

/// Counts the top-level commas in `arguments`, skipping strings and nested
/// brackets. `None` once the call's own closing parenthesis has been passed.
fn argument_index(arguments: &str) -> Option<usize> {
    let mut index = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in arguments.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => index += 1,
            _ => {}
        }
    }

    Some(index)
}
