use std::path::Path;

use tower_lsp::lsp_types::{CompletionItem, CompletionList, CompletionParams, CompletionResponse};

use crate::workspace::Workspace;

use self::mixin_completer::MixinCompleter;
use self::path_completer::TemplatePathCompleter;

mod mixin_completer;
mod path_completer;
mod util;

#[derive(Clone, Copy)]
pub struct Context<'a> {
    workspace: &'a Workspace,
    path: &'a Path,
}

pub trait Completer<'a>: Sized {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self>
    where
        Self: Sized + Completer<'a>;

    fn completions(&self) -> Vec<impl Completable<'a, Self>>
    where
        Self: Sized;
}

pub trait Completable<'a, T: Completer<'a>>: Sized {
    fn completions(&self, completer: &T) -> Option<CompletionItem>;
}

/// Range of char columns on the cursor's line.
type LineRange = std::ops::Range<usize>;

pub fn get_completions(
    workspace: &Workspace,
    params: &CompletionParams,
    path: &Path,
) -> Option<CompletionResponse> {
    let completion_context = Context { workspace, path };
    let position = params.text_document_position.position;

    run_completer::<MixinCompleter>(completion_context, position.line, position.character).or_else(
        || {
            run_completer::<TemplatePathCompleter>(
                completion_context,
                position.line,
                position.character,
            )
        },
    )
}

fn run_completer<'a, T: Completer<'a>>(
    context: Context<'a>,
    line: u32,
    character: u32,
) -> Option<CompletionResponse> {
    let completer = T::construct(context, line as usize, character as usize)?;

    let items = completer
        .completions()
        .into_iter()
        .flat_map(|completable| completable.completions(&completer))
        .collect::<Vec<CompletionItem>>();

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: false,
        items,
    }))
}
