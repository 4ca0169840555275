use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use pathdiff::diff_paths;
use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Position, Range, TextEdit,
};

use crate::workspace::{utf16_column, Workspace};

use super::{util::line_prefix, Completable, Completer, Context, LineRange};

static DIRECTIVE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:include|extends)\s+['"]?(?<typed>[^'"\s]*)$"#)
        .expect("directive prefix regex")
});

/// Completes the target of an `include`/`extends` being typed.
///
/// Offers every other template, relative to the current document's
/// directory and without the template extension.
pub struct TemplatePathCompleter<'a> {
    typed: (String, LineRange),
    line_nr: usize,
    workspace: &'a Workspace,
    path: &'a Path,
}

impl<'a> Completer<'a> for TemplatePathCompleter<'a> {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self> {
        let prefix = line_prefix(&context, line, character)?;
        let typed = DIRECTIVE_PREFIX_RE.captures(&prefix)?.name("typed")?;
        let start = utf16_column(&prefix, typed.start()) as usize;

        Some(Self {
            typed: (typed.as_str().to_string(), start..character),
            line_nr: line,
            workspace: context.workspace,
            path: context.path,
        })
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let Some(dir) = self.path.parent() else {
            return vec![];
        };
        let extension = format!(".{}", self.workspace.resolver().extension());

        self.workspace
            .template_files()
            .into_iter()
            .filter(|file| file != self.path)
            .filter_map(|file| {
                let relative = diff_paths(&file, dir)?;
                let target = relative.to_string_lossy();
                let target = target.strip_suffix(&extension).unwrap_or(&target).to_string();
                target
                    .starts_with(self.typed.0.as_str())
                    .then_some(PathCompletion { target, file })
            })
            .collect()
    }
}

struct PathCompletion {
    target: String,
    file: PathBuf,
}

impl<'a> Completable<'a, TemplatePathCompleter<'a>> for PathCompletion {
    fn completions(&self, completer: &TemplatePathCompleter<'a>) -> Option<CompletionItem> {
        let line = completer.line_nr as u32;

        Some(CompletionItem {
            label: self.target.clone(),
            kind: Some(CompletionItemKind::FILE),
            detail: Some(self.file.display().to_string()),
            filter_text: Some(self.target.clone()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: Range {
                    start: Position::new(line, completer.typed.1.start as u32),
                    end: Position::new(line, completer.typed.1.end as u32),
                },
                new_text: self.target.clone(),
            })),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::get_completions;
    use super::super::tests::{completion_params, labels};
    use crate::test_utils::create_test_workspace;

    #[test]
    fn test_relative_targets_without_extension() {
        let (_temp_dir, dir, workspace) = create_test_workspace(&[
            ("layouts/base.pug", ""),
            ("partials/nav.pug", ""),
            ("partials/footer.pug", ""),
            ("pages/home.pug", "extends \ninclude '../partials/n"),
        ]);
        let home = dir.join("pages/home.pug");

        let all = get_completions(&workspace, &completion_params(&home, 0, 8), &home);
        assert_eq!(
            labels(all),
            vec![
                "../layouts/base",
                "../partials/footer",
                "../partials/nav",
            ]
        );

        let typed = get_completions(&workspace, &completion_params(&home, 1, 22), &home);
        assert_eq!(labels(typed), vec!["../partials/nav"]);
    }
}
