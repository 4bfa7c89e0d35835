use std::{path::PathBuf, sync::Arc};

use code_call_lens::{scan, AnnotationResolver, LensSettings, ScanError, GRAMMAR_TABLE};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::{
    jsonrpc::{Error, ErrorCode},
    lsp_types::{
        CodeLens, CodeLensOptions, CodeLensParams, Command, DidChangeConfigurationParams,
        DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
        InitializeParams, InitializeResult, InitializedParams, MessageType, ServerCapabilities,
        ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, Url,
    },
    Client, LanguageServer,
};

use crate::{
    document::{Document, LensData},
    project_settings::{read_project_settings, SettingsLayers},
};

type JsonRpcResult<T> = tower_lsp::jsonrpc::Result<T>;

pub struct Backend {
    pub client: Client,
    /// Concurrent hashmap from document uri to the open document and its
    /// latest method-site inventory.
    pub documents: DashMap<Url, Document>,
    pub settings: RwLock<SettingsLayers>,
    pub resolver: RwLock<Arc<AnnotationResolver>>,
}

fn content_modified() -> Error {
    let mut error = Error::new(ErrorCode::ContentModified);
    error.message = "document changed since the code lens was computed".into();
    error
}

fn uri_to_path(uri: &Url) -> JsonRpcResult<PathBuf> {
    uri.to_file_path()
        .map_err(|_| Error::invalid_params("workspace root must be a local file uri"))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> JsonRpcResult<InitializeResult> {
        #[allow(deprecated)]
        let root_uri = params.root_uri.clone();

        let project = match root_uri {
            None => Value::Null,
            Some(uri) => {
                let root_path = uri_to_path(&uri)?;
                match read_project_settings(&root_path).await {
                    Ok(value) => value,
                    Err(msg) => {
                        self.client
                            .log_message(
                                MessageType::WARNING,
                                format!(
                                    "ignoring project settings under path={:?} because {}",
                                    root_path, msg
                                ),
                            )
                            .await;
                        Value::Null
                    }
                }
            }
        };

        {
            let mut layers = self.settings.write().await;
            layers.project = project;
            layers.client = params.initialization_options.unwrap_or(Value::Null);
        }
        self.reload_resolver().await;

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                code_lens_provider: Some(CodeLensOptions {
                    resolve_provider: Some(true),
                }),
                ..ServerCapabilities::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!(grammars = GRAMMAR_TABLE.len(), "code call lens server ready");
    }

    async fn shutdown(&self) -> JsonRpcResult<()> {
        for document in self.documents.iter() {
            document.cancel.cancel();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        let path = document.uri.to_file_path().ok();
        if GRAMMAR_TABLE
            .for_document(&document.language_id, path.as_deref())
            .is_none()
        {
            self.client
                .log_message(
                    MessageType::INFO,
                    format!(
                        "not tracking file with uri={:?} because no grammar handles language={:?}",
                        document.uri, document.language_id
                    ),
                )
                .await;
            return;
        }

        tracing::debug!(uri = %document.uri, "opened document");
        self.documents.insert(
            document.uri,
            Document::new(document.language_id, document.version, document.text),
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // full sync: the last change carries the whole text
        let text = match params.content_changes.into_iter().last() {
            None => return,
            Some(change) => change.text,
        };

        let found = match self.documents.get_mut(&uri) {
            None => false,
            Some(mut document) => {
                document.refresh(params.text_document.version, text);
                true
            }
        };
        if !found {
            tracing::debug!(uri = %uri, "change for untracked document");
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if let Some((_, document)) = self.documents.remove(&params.text_document.uri) {
            document.cancel.cancel();
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.settings.write().await.client = params.settings;
        self.reload_resolver().await;
        for mut document in self.documents.iter_mut() {
            document.invalidate();
        }

        if let Err(e) = self.client.code_lens_refresh().await {
            tracing::debug!("client didn't refresh code lenses: {:?}", e);
        }
    }

    async fn code_lens(&self, params: CodeLensParams) -> JsonRpcResult<Option<Vec<CodeLens>>> {
        let uri = params.text_document.uri;
        let settings = self.resolver.read().await.settings().clone();

        let lenses = match self.scan_document(&uri, &settings) {
            None => return Ok(None),
            Some(Ok(lenses)) => lenses,
            Some(Err(e)) => {
                tracing::error!(uri = %uri, "scan failed: {}", e);
                self.client
                    .log_message(
                        MessageType::ERROR,
                        format!("couldn't scan file with uri={:?} due to {}", uri, e),
                    )
                    .await;
                Vec::new()
            }
        };
        Ok(Some(lenses))
    }

    async fn code_lens_resolve(&self, mut lens: CodeLens) -> JsonRpcResult<CodeLens> {
        let data: LensData = match lens.data.clone().map(serde_json::from_value) {
            Some(Ok(data)) => data,
            _ => return Err(Error::invalid_params("code lens is missing its site data")),
        };

        let site_and_cancel = self
            .documents
            .get(&data.uri)
            .and_then(|document| document.site_for(&data));
        let (mut site, cancel) = match site_and_cancel {
            None => return Err(content_modified()),
            Some(found) => found,
        };

        let resolver = self.resolver.read().await.clone();
        let label = match resolver.annotate(&mut site, &cancel).await {
            None => return Err(content_modified()),
            Some(label) => label,
        };

        if let Some(mut document) = self.documents.get_mut(&data.uri) {
            document.store_annotated(&data, site);
        }

        lens.command = Some(Command {
            title: label,
            command: String::new(),
            arguments: None,
        });
        Ok(lens)
    }
}

impl Backend {
    pub fn new(client: Client, resolver: AnnotationResolver) -> Self {
        Self {
            client,
            documents: DashMap::new(),
            settings: RwLock::new(SettingsLayers::default()),
            resolver: RwLock::new(Arc::new(resolver)),
        }
    }

    /// Rebuilds the resolver from the current settings layers. Bad settings
    /// leave the previous resolver in place.
    async fn reload_resolver(&self) {
        let effective = self.settings.read().await.effective();
        let settings = match effective {
            Ok(settings) => settings,
            Err(msg) => {
                self.client
                    .log_message(
                        MessageType::ERROR,
                        format!("keeping previous settings: {}", msg),
                    )
                    .await;
                return;
            }
        };

        let current = self.resolver.read().await.clone();
        match current.reconfigure(settings) {
            Ok(resolver) => {
                tracing::info!(settings = ?resolver.settings(), "settings loaded");
                *self.resolver.write().await = Arc::new(resolver);
            }
            Err(e) => {
                self.client
                    .log_message(
                        MessageType::ERROR,
                        format!("couldn't build statistics client: {}", e),
                    )
                    .await;
            }
        }
    }

    /// Turns the inventory of a tracked document into unresolved code lenses,
    /// scanning it first if the text changed. `None` if the document isn't
    /// tracked.
    fn scan_document(
        &self,
        uri: &Url,
        settings: &LensSettings,
    ) -> Option<Result<Vec<CodeLens>, ScanError>> {
        let mut document = self.documents.get_mut(uri)?;
        if !document.scanned {
            let path = uri.to_file_path().ok();
            let grammar = GRAMMAR_TABLE.for_document(&document.language_id, path.as_deref())?;
            match scan(grammar, &document.text, settings) {
                Ok(sites) => document.replace_sites(sites),
                Err(e) => {
                    document.replace_sites(Vec::new());
                    return Some(Err(e));
                }
            };
        }

        let generation = document.generation;
        let lenses = document
            .sites
            .iter()
            .enumerate()
            .map(|(index, site)| CodeLens {
                range: document.position_finder.get_range(&document.text, site.range),
                command: None,
                data: serde_json::to_value(LensData {
                    uri: uri.clone(),
                    generation,
                    index,
                })
                .ok(),
            })
            .collect();
        Some(Ok(lenses))
    }
}
