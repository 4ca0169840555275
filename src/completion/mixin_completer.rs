use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionTextEdit, Position,
    Range, TextEdit,
};

use crate::workspace::{utf16_column, MixinDefinition, Workspace};

use super::{util::line_prefix, Completable, Completer, Context, LineRange};

static MIXIN_CALL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?<indent>\s*)\+(?<typed>[A-Za-z0-9_-]*)$").expect("mixin call prefix regex")
});

/// Completes the name of a `+call` being typed at the start of a line.
pub struct MixinCompleter<'a> {
    /// What has been typed after the `+`
    typed: (String, LineRange),
    line_nr: usize,
    workspace: &'a Workspace,
    path: &'a Path,
}

impl<'a> Completer<'a> for MixinCompleter<'a> {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self> {
        if !context.workspace.settings().mixin_completions {
            return None;
        }

        let prefix = line_prefix(&context, line, character)?;
        let captures = MIXIN_CALL_PREFIX_RE.captures(&prefix)?;
        let typed = captures.name("typed")?;
        let start = utf16_column(&prefix, captures.name("indent")?.end()) as usize + 1;

        Some(Self {
            typed: (typed.as_str().to_string(), start..character),
            line_nr: line,
            workspace: context.workspace,
            path: context.path,
        })
    }

    /// Mixins known to a ready index plus the ones declared in this file.
    /// The local declarations win for names defined in both.
    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let mut by_name: HashMap<String, MixinDefinition> = HashMap::new();

        if let Some(snapshot) = self.workspace.index().snapshot() {
            for definitions in snapshot.values() {
                if let Some(first) = definitions.first() {
                    by_name.insert(first.name.clone(), first.clone());
                }
            }
        }

        if let Some(file) = self.workspace.scan_blocking(self.path) {
            for definition in file.mixins {
                by_name.insert(definition.name.clone(), definition);
            }
        }

        let mut completions: Vec<MixinCompletion> = by_name
            .into_values()
            .filter(|definition| definition.name.starts_with(self.typed.0.as_str()))
            .map(MixinCompletion)
            .collect();
        completions.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        completions
    }
}

struct MixinCompletion(MixinDefinition);

impl<'a> Completable<'a, MixinCompleter<'a>> for MixinCompletion {
    fn completions(&self, completer: &MixinCompleter<'a>) -> Option<CompletionItem> {
        let definition = &self.0;
        let line = completer.line_nr as u32;
        let range = Range {
            start: Position::new(line, completer.typed.1.start as u32),
            end: Position::new(line, completer.typed.1.end as u32),
        };

        Some(CompletionItem {
            label: definition.name.clone(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some(definition.signature()),
            label_details: Some(CompletionItemLabelDetails {
                detail: (!definition.parameters.is_empty())
                    .then(|| format!("({})", definition.parameters.join(", "))),
                description: definition
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
            }),
            filter_text: Some(definition.name.clone()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range,
                new_text: definition.name.clone(),
            })),
            ..Default::default()
        })
    }
}
