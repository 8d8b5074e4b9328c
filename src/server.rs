/// LSP server trait implementation.
///
/// This module contains the `impl LanguageServer for Backend` block,
/// which handles all LSP protocol messages (initialize, didOpen, didChange,
/// didSave, didClose, definition, references, hover, completion).  Every
/// query converts the cursor into a `SourceLocation`, runs the matching
/// resolver against the cache and converts the answer back.
use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{debug, info, warn};

use crate::Backend;
use crate::config::Config;
use crate::definition::DefinitionResolver;
use crate::hover::HoverResolver;
use crate::locate::TermLocator;
use crate::references::ReferenceResolver;
use crate::util::{LineIndex, uri_to_key};
use crate::workspace;

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok())
            .or_else(|| params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok()));

        let snippets = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|t| t.completion.as_ref())
            .and_then(|c| c.completion_item.as_ref())
            .and_then(|item| item.snippet_support)
            .unwrap_or(false);
        *self.snippet_support.lock() = snippets;

        *self.config.write() = Config::load(self.config_path.as_deref(), workspace_root.as_deref());
        *self.workspace_root.lock() = workspace_root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![".".to_string()]),
                    ..CompletionOptions::default()
                }),
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..TextDocumentSyncOptions::default()
                })),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let workspace_root: Option<PathBuf> = self.workspace_root.lock().clone();
        let config = self.config();

        let Some(root) = workspace_root.filter(|_| config.workspace.index_on_start) else {
            self.log(MessageType::INFO, "regols initialized".to_string()).await;
            return;
        };

        let cache = Arc::clone(&self.cache);
        let indexed = tokio::task::spawn_blocking(move || workspace::index_workspace(&cache, &root, &config))
            .await
            .unwrap_or_else(|err| {
                warn!("workspace indexing failed: {err}");
                0
            });
        self.log(
            MessageType::INFO,
            format!("regols initialized, indexed {indexed} policy file(s)"),
        )
        .await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let key = uri_to_key(&params.text_document.uri);
        self.cache.put(&key, &params.text_document.text);
        self.schedule_diagnostics(&key);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let key = uri_to_key(&params.text_document.uri);
        // Full sync: the last change holds the whole document.
        if let Some(change) = params.content_changes.last() {
            self.cache.put(&key, &change.text);
            self.schedule_diagnostics(&key);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let key = uri_to_key(&params.text_document.uri);
        if let Some(text) = &params.text {
            self.cache.put(&key, text);
        }
        self.schedule_diagnostics(&key);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let key = uri_to_key(&params.text_document.uri);
        self.diagnostics.forget(&key);
        debug!(path = %key, "document closed");
        self.cache.delete(&key);
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let Some(cursor) = self.cursor_location(&position.text_document.uri, position.position) else {
            return Ok(None);
        };
        let Some(term) = TermLocator::new(&self.cache).locate(&cursor) else {
            return Ok(None);
        };

        let locations: Vec<Location> = DefinitionResolver::new(&self.cache)
            .resolve(&term)
            .iter()
            .filter_map(|loc| self.to_lsp_location(loc))
            .collect();
        if locations.is_empty() {
            return Ok(None);
        }
        Ok(Some(GotoDefinitionResponse::Array(locations)))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let Some(cursor) = self.cursor_location(&position.text_document.uri, position.position) else {
            return Ok(None);
        };
        let Some(term) = TermLocator::new(&self.cache).locate(&cursor) else {
            return Ok(None);
        };

        let locations: Vec<Location> = ReferenceResolver::new(&self.cache)
            .resolve(&term)
            .iter()
            .filter_map(|loc| self.to_lsp_location(loc))
            .collect();
        if locations.is_empty() {
            return Ok(None);
        }
        Ok(Some(locations))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some(cursor) = self.cursor_location(&position.text_document.uri, position.position) else {
            return Ok(None);
        };
        let Some(term) = TermLocator::new(&self.cache).locate(&cursor) else {
            return Ok(None);
        };

        let documents = HoverResolver::new(&self.cache).resolve(&term);
        if documents.is_empty() {
            return Ok(None);
        }
        let range = self
            .cache
            .get(&term.location.file)
            .map(|policy| LineIndex::new(&policy.raw_text).range(&term.location));
        let contents = documents
            .into_iter()
            .map(|doc| {
                MarkedString::LanguageString(LanguageString {
                    language: doc.language,
                    value: doc.content,
                })
            })
            .collect();
        Ok(Some(Hover {
            contents: HoverContents::Array(contents),
            range,
        }))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        self.handle_completion(params).await
    }
}
