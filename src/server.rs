//! The LSP backend.
//!
//! A [`Workspace`] is created on `initialize` from the client's workspace
//! folders. The mixin index is built in the background once the client
//! reports `initialized`; until then index-backed features answer from the
//! current file or not at all.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

use crate::completion::get_completions;
use crate::config::Settings;
use crate::diagnostics::diagnostics;
use crate::file_rename::will_rename_files;
use crate::folding::folding_ranges;
use crate::gotodef::goto_definition;
use crate::highlight::document_highlight;
use crate::hover::hover;
use crate::references::references;
use crate::rename::{prepare_rename, rename};
use crate::signature_help::signature_help;
use crate::symbol::{document_symbol, workspace_symbol};
use crate::workspace::{all_referenced_files, is_mixin_name, normalize, FileEvent, Workspace};

pub const LIST_DEPENDENCIES: &str = "pugls.listDependencies";
pub const REBUILD_MIXIN_INDEX: &str = "pugls.rebuildMixinIndex";

pub struct Backend {
    client: Client,
    workspace: OnceCell<Arc<Workspace>>,
    /// Cancels the running full index build, if any.
    build: Mutex<CancellationToken>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            workspace: OnceCell::new(),
            build: Mutex::new(CancellationToken::new()),
        }
    }

    fn workspace(&self) -> Result<Arc<Workspace>> {
        self.workspace
            .get()
            .cloned()
            .ok_or_else(Error::invalid_request)
    }

    /// Runs a blocking feature on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Workspace) -> T + Send + 'static,
    {
        let workspace = self.workspace()?;
        tokio::task::spawn_blocking(move || f(&workspace))
            .await
            .map_err(|err| {
                warn!(%err, "feature task failed");
                Error::internal_error()
            })
    }

    /// Cancels any running build and starts a new one in the background.
    fn rebuild_index(&self, workspace: Arc<Workspace>) {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.build.lock(), token.clone());
        previous.cancel();

        let client = self.client.clone();
        tokio::spawn(async move {
            match workspace.build_index(&token).await {
                Ok(count) => {
                    client
                        .log_message(
                            MessageType::INFO,
                            format!("pugls: indexed {count} mixin definitions"),
                        )
                        .await
                }
                Err(cancelled) => debug!(%cancelled, "superseded index build"),
            }
        });
    }

    async fn publish_diagnostics(&self, uri: Url) {
        let Ok(workspace) = self.workspace() else {
            return;
        };
        let Some(path) = to_path(&uri) else {
            return;
        };

        let diags = diagnostics(&workspace, &path, &CancellationToken::new())
            .await
            .unwrap_or_default();
        self.client.publish_diagnostics(uri, diags, None).await;
    }

    async fn report_broken_references(&self, workspace: Arc<Workspace>, deleted: PathBuf) {
        let shown = deleted.clone();
        let broken = self
            .blocking(move |workspace| workspace.directives_targeting(&deleted))
            .await
            .unwrap_or_default();

        for directive in &broken {
            warn!(
                deleted = %shown.display(),
                source = %directive.source.display(),
                line = directive.line + 1,
                "{} now points at a missing file",
                directive.kind.keyword()
            );
        }
        let sources: BTreeSet<PathBuf> = broken.into_iter().map(|d| d.source).collect();
        for source in sources {
            if workspace.documents().is_open(&source) {
                if let Ok(uri) = Url::from_file_path(&source) {
                    self.publish_diagnostics(uri).await;
                }
            }
        }
    }

    async fn list_dependencies(&self, arguments: Vec<Value>) -> Result<Option<Value>> {
        let workspace = self.workspace()?;
        let uri = arguments
            .first()
            .and_then(Value::as_str)
            .and_then(|uri| Url::parse(uri).ok())
            .ok_or_else(|| Error::invalid_params("expected a document uri"))?;
        let path = to_path(&uri).ok_or_else(|| Error::invalid_params("not a file uri"))?;

        let files = all_referenced_files(&workspace, &path, &CancellationToken::new())
            .await
            .map_err(|_| Error::request_cancelled())?;

        let uris: Vec<String> = files
            .iter()
            .filter_map(|file| Url::from_file_path(file).ok())
            .map(String::from)
            .collect();
        Ok(Some(Value::from(uris)))
    }
}

fn to_path(uri: &Url) -> Option<PathBuf> {
    uri.to_file_path().ok().map(|path| normalize(&path))
}

fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
    let folders: Vec<PathBuf> = params
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|folder| to_path(&folder.uri))
        .collect();
    if !folders.is_empty() {
        return folders;
    }

    #[allow(deprecated)]
    let root = params.root_uri.as_ref().and_then(to_path);
    root.or_else(|| std::env::current_dir().ok())
        .into_iter()
        .collect()
}

/// Template files by extension, and folders since they may contain templates.
fn rename_filters(extension: &str) -> FileOperationRegistrationOptions {
    let filter = |glob: String, matches| FileOperationFilter {
        scheme: Some("file".to_string()),
        pattern: FileOperationPattern {
            glob,
            matches: Some(matches),
            options: None,
        },
    };

    FileOperationRegistrationOptions {
        filters: vec![
            filter(format!("**/*.{extension}"), FileOperationPatternKind::File),
            filter("**/*".to_string(), FileOperationPatternKind::Folder),
        ],
    }
}

fn load_settings(root: Option<&Path>) -> Settings {
    let Some(root) = root else {
        return Settings::default();
    };
    Settings::new(root).unwrap_or_else(|err| {
        warn!(%err, "could not load settings, using defaults");
        Settings::default()
    })
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let roots = workspace_roots(&params);
        let settings = load_settings(roots.first().map(PathBuf::as_path));
        info!(roots = ?roots, "initializing workspace");

        let extension = settings.extension.trim_start_matches('.').to_string();
        if self
            .workspace
            .set(Arc::new(Workspace::new(settings, roots)))
            .is_err()
        {
            warn!("initialize received for an already initialized server");
            return Err(Error::invalid_request());
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "pugls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                })),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["+".into(), " ".into(), "/".into()]),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".into(), ",".into()]),
                    retrigger_characters: None,
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                document_highlight_provider: Some(OneOf::Left(true)),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: None,
                    file_operations: Some(WorkspaceFileOperationsServerCapabilities {
                        will_rename: Some(rename_filters(&extension)),
                        ..Default::default()
                    }),
                }),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![LIST_DEPENDENCIES.into(), REBUILD_MIXIN_INDEX.into()],
                    ..Default::default()
                }),
                ..ServerCapabilities::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let Ok(workspace) = self.workspace() else {
            return;
        };

        let pattern = format!("**/*.{}", workspace.resolver().extension());
        let registration = Registration {
            id: "pugls-watched-templates".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
                watchers: vec![FileSystemWatcher {
                    glob_pattern: GlobPattern::String(pattern),
                    kind: None,
                }],
            })
            .ok(),
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            warn!(%err, "client refused file watching");
        }

        self.rebuild_index(workspace);
    }

    async fn shutdown(&self) -> Result<()> {
        self.build.lock().cancel();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let (Ok(workspace), Some(path)) = (self.workspace(), to_path(&params.text_document.uri))
        else {
            return;
        };
        workspace
            .documents()
            .open(path, &params.text_document.text);
        self.publish_diagnostics(params.text_document.uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let (Ok(workspace), Some(path)) = (self.workspace(), to_path(&params.text_document.uri))
        else {
            return;
        };
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        workspace.documents().open(path.clone(), &change.text);
        workspace.handle_event(FileEvent::Changed(path)).await;
        self.publish_diagnostics(params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let (Ok(workspace), Some(path)) = (self.workspace(), to_path(&params.text_document.uri))
        else {
            return;
        };

        // the file on disk is authoritative again
        workspace.documents().close(&path);
        workspace.handle_event(FileEvent::Changed(path)).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let Ok(workspace) = self.workspace() else {
            return;
        };

        for change in params.changes {
            let Some(path) = to_path(&change.uri) else {
                continue;
            };
            let event = match change.typ {
                FileChangeType::CREATED => FileEvent::Created(path),
                FileChangeType::DELETED => FileEvent::Deleted(path),
                _ => FileEvent::Changed(path),
            };
            debug!(?event, "watched file event");

            if let FileEvent::Deleted(path) = &event {
                if workspace.is_template(path) {
                    self.report_broken_references(workspace.clone(), path.clone())
                        .await;
                }
            }
            workspace.handle_event(event).await;
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match params.command.as_str() {
            LIST_DEPENDENCIES => self.list_dependencies(params.arguments).await,
            REBUILD_MIXIN_INDEX => {
                self.rebuild_index(self.workspace()?);
                Ok(None)
            }
            other => Err(Error::invalid_params(format!("unknown command {other}"))),
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let workspace = self.workspace()?;
        let position = params.text_document_position_params;
        let Some(path) = to_path(&position.text_document.uri) else {
            return Ok(None);
        };

        Ok(
            goto_definition(&workspace, &path, position.position, &CancellationToken::new())
                .await
                .map(GotoDefinitionResponse::Array),
        )
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let Some(path) = to_path(&position.text_document.uri) else {
            return Ok(None);
        };
        let include_declaration = params.context.include_declaration;

        self.blocking(move |workspace| {
            references(workspace, position.position, &path, include_declaration)
        })
        .await
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        let Some(path) = to_path(&params.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| prepare_rename(workspace, params.position, &path))
            .await
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        if !is_mixin_name(&params.new_name) {
            return Err(Error::invalid_params(format!(
                "'{}' is not a valid mixin name",
                params.new_name
            )));
        }
        let Some(path) = to_path(&params.text_document_position.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| rename(workspace, &params, &path))
            .await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(path) = to_path(&params.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| document_symbol(workspace, &path))
            .await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        self.blocking(move |workspace| workspace_symbol(workspace, &params))
            .await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let Some(path) = to_path(&params.text_document_position_params.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| hover(workspace, &params, &path))
            .await
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let Some(path) = to_path(&params.text_document_position.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| get_completions(workspace, &params, &path))
            .await
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let Some(path) = to_path(&params.text_document_position_params.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| signature_help(workspace, &params, &path))
            .await
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(path) = to_path(&params.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| folding_ranges(workspace, &path))
            .await
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let position = params.text_document_position_params;
        let Some(path) = to_path(&position.text_document.uri) else {
            return Ok(None);
        };
        self.blocking(move |workspace| document_highlight(workspace, position.position, &path))
            .await
    }

    async fn will_rename_files(&self, params: RenameFilesParams) -> Result<Option<WorkspaceEdit>> {
        self.blocking(move |workspace| will_rename_files(workspace, &params))
            .await
    }
}
