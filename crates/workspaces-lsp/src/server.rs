use crate::config::WorkspacesConfig;
use crate::document::{DocumentState, ServerState, WorkspaceContext};
use crate::handlers::{completion, definition, diagnostics, is_manifest_uri};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::ls_types::{
    CompletionItem, CompletionOptions, CompletionParams, CompletionResponse,
    DidChangeTextDocumentParams, DidChangeWatchedFilesParams,
    DidChangeWatchedFilesRegistrationOptions, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, FileSystemWatcher, GlobPattern,
    GotoDefinitionParams, GotoDefinitionResponse, InitializeParams, InitializeResult,
    InitializedParams, MessageType, OneOf, Registration, SaveOptions, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions, Uri,
};
use tower_lsp_server::{Client, LanguageServer};
use workspaces_core::{
    MANIFEST_FILE, PackageManagerKind, RegistryRefresher, WorkspaceRegistry, find_workspace_root,
    watched_file_names,
};

const SERVER_NAME: &str = "npm-workspaces-lsp";
const WATCHED_FILES_REGISTRATION_ID: &str = "npm-workspaces-lsp/watched-files";

/// Delay before validating after an edit; a newer edit restarts it.
const CHANGE_DEBOUNCE: Duration = Duration::from_millis(100);

pub struct Backend {
    client: Client,
    state: Arc<ServerState>,
    config: Arc<RwLock<WorkspacesConfig>>,
    dynamic_watch_registration: AtomicBool,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::new()),
            config: Arc::new(RwLock::new(WorkspacesConfig::default())),
            dynamic_watch_registration: AtomicBool::new(false),
        }
    }

    fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(false),
                    })),
                    ..Default::default()
                },
            )),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec!["\"".into()]),
                resolve_provider: Some(true),
                ..Default::default()
            }),
            definition_provider: Some(OneOf::Left(true)),
            ..Default::default()
        }
    }

    async fn schedule_validation(&self, uri: Uri, debounce: Option<Duration>) {
        schedule_validation(&self.client, &self.state, &self.config, uri, debounce).await;
    }

    /// Re-validates every open manifest whenever the registry publishes a
    /// new snapshot, whatever triggered the refresh.
    fn revalidate_on_refresh(&self, registry: &WorkspaceRegistry) {
        let mut snapshots = registry.subscribe();
        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let open_manifests: Vec<Uri> = state
                    .documents
                    .iter()
                    .map(|entry| entry.key().clone())
                    .filter(is_manifest_uri)
                    .collect();

                tracing::debug!(
                    "workspace refreshed; re-validating {} open manifest(s)",
                    open_manifests.len()
                );
                for uri in open_manifests {
                    schedule_validation(&client, &state, &config, uri, Some(CHANGE_DEBOUNCE))
                        .await;
                }
            }
        });
    }

    /// Sets up workspace file watching once per session: through the client
    /// when it supports dynamic registration, in process otherwise or when
    /// the registration is refused.
    async fn start_watching(&self, workspace: &WorkspaceContext) {
        if workspace.registry.root().is_none() || !workspace.refresher.begin_watch() {
            return;
        }

        let kind = workspace.registry.snapshot().package_manager;
        if self.dynamic_watch_registration.load(Ordering::SeqCst)
            && self.register_file_watchers(kind).await
        {
            return;
        }

        if let Err(e) = workspace.refresher.watch_in_process() {
            tracing::warn!("workspace changes will not be picked up: {}", e);
            self.client
                .log_message(
                    MessageType::WARNING,
                    format!("{} cannot watch the workspace: {}", SERVER_NAME, e),
                )
                .await;
        }
    }

    /// Asks the client to report watched-file changes. Returns whether the
    /// client accepted the registration.
    async fn register_file_watchers(&self, kind: PackageManagerKind) -> bool {
        let mut globs: Vec<String> = watched_file_names(kind)
            .into_iter()
            .map(|name| format!("**/{name}"))
            .collect();
        let manifest_glob = format!("**/{MANIFEST_FILE}");
        if !globs.contains(&manifest_glob) {
            globs.push(manifest_glob);
        }

        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: globs
                .into_iter()
                .map(|glob| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(glob),
                    kind: None,
                })
                .collect(),
        };

        let registration = Registration {
            id: WATCHED_FILES_REGISTRATION_ID.into(),
            method: "workspace/didChangeWatchedFiles".into(),
            register_options: serde_json::to_value(options).ok(),
        };

        match self.client.register_capability(vec![registration]).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to register file watchers: {}", e);
                false
            }
        }
    }
}

/// Validates `uri` in the background, replacing any pending validation of
/// the same document.
async fn schedule_validation(
    client: &Client,
    state: &Arc<ServerState>,
    config: &Arc<RwLock<WorkspacesConfig>>,
    uri: Uri,
    debounce: Option<Duration>,
) {
    let client = client.clone();
    let task_state = Arc::clone(state);
    let config = Arc::clone(config);
    let task_uri = uri.clone();

    let task = tokio::spawn(async move {
        if let Some(delay) = debounce {
            tokio::time::sleep(delay).await;
        }

        let config = config.read().await.clone();
        match diagnostics::handle_diagnostics(task_state, &task_uri, &config).await {
            Ok(diags) => client.publish_diagnostics(task_uri, diags, None).await,
            Err(e) => {
                tracing::warn!("Skipping validation of {:?}: {}", task_uri, e);
                client
                    .log_message(
                        MessageType::WARNING,
                        format!("Skipping validation of {}: {}", task_uri.as_str(), e),
                    )
                    .await;
            }
        }
    });

    state.spawn_background_task(uri, task).await;
}

/// Workspace root for the session: the first workspace folder, else
/// `rootUri`, else the working directory, widened to the enclosing
/// workspace root when one exists.
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    #[allow(deprecated)]
    let from_client = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .and_then(|folder| folder.uri.to_file_path().map(Cow::into_owned))
        .or_else(|| {
            params
                .root_uri
                .as_ref()
                .and_then(|uri| uri.to_file_path().map(Cow::into_owned))
        });

    let start = from_client.or_else(|| std::env::current_dir().ok())?;
    Some(find_workspace_root(&start).unwrap_or(start))
}

fn supports_dynamic_watch_registration(params: &InitializeParams) -> bool {
    params
        .capabilities
        .workspace
        .as_ref()
        .and_then(|workspace| workspace.did_change_watched_files.as_ref())
        .and_then(|watch| watch.dynamic_registration)
        .unwrap_or(false)
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing {} server", SERVER_NAME);

        let config = WorkspacesConfig::from_init_options(params.initialization_options.clone());
        tracing::debug!("loaded configuration: {:?}", config);
        *self.config.write().await = config;

        self.dynamic_watch_registration.store(
            supports_dynamic_watch_registration(&params),
            Ordering::SeqCst,
        );

        let root = workspace_root(&params);
        match &root {
            Some(root) => tracing::info!("workspace root: {}", root.display()),
            None => tracing::warn!("no workspace root; running without workspace features"),
        }

        let registry = Arc::new(WorkspaceRegistry::new(root));
        let scan = Arc::clone(&registry);
        if let Err(e) = tokio::task::spawn_blocking(move || scan.refresh()).await {
            tracing::error!("initial workspace scan panicked: {}", e);
        }
        self.revalidate_on_refresh(&registry);

        let context = WorkspaceContext {
            refresher: RegistryRefresher::spawn(Arc::clone(&registry)),
            registry,
        };
        if !self.state.set_workspace(context) {
            tracing::warn!("workspace already initialized; keeping the first one");
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("{} server initialized", SERVER_NAME);

        let snapshot = self.state.snapshot();
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "{} ready: {} workspace, {} package(s), {} catalog entr(ies)",
                    SERVER_NAME,
                    snapshot.package_manager,
                    snapshot.packages.len(),
                    snapshot.catalogs.len()
                ),
            )
            .await;

        let Some(workspace) = self.state.workspace() else {
            return;
        };
        if self.config.read().await.watch_lockfile {
            self.start_watching(workspace).await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down {} server", SERVER_NAME);
        self.state.cancel_all_background_tasks().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document opened: {:?}", uri);

        self.state.update_document(
            uri.clone(),
            DocumentState::new(params.text_document.text, Some(params.text_document.version)),
        );

        if is_manifest_uri(&uri) {
            self.schedule_validation(uri, None).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        self.state.update_document(
            uri.clone(),
            DocumentState::new(change.text, Some(params.text_document.version)),
        );

        if is_manifest_uri(&uri) {
            self.schedule_validation(uri, Some(CHANGE_DEBOUNCE)).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(text) = params.text {
            let version = self.state.get_document(&uri).and_then(|doc| doc.version);
            self.state
                .update_document(uri.clone(), DocumentState::new(text, version));
        }

        if is_manifest_uri(&uri) {
            self.schedule_validation(uri, None).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {:?}", uri);

        self.state.remove_document(&uri);
        self.state.cancel_background_task(&uri).await;
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        tracing::trace!("received {} watched file change(s)", params.changes.len());

        let Some(workspace) = self.state.workspace() else {
            return;
        };

        let scheduled = params
            .changes
            .iter()
            .filter_map(|change| change.uri.to_file_path())
            .filter(|path| workspace.refresher.notify(path))
            .count();
        tracing::debug!("{} change(s) scheduled a workspace refresh", scheduled);
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(completion::handle_completion(Arc::clone(&self.state), params).await)
    }

    async fn completion_resolve(&self, params: CompletionItem) -> Result<CompletionItem> {
        Ok(completion::handle_completion_resolve(Arc::clone(&self.state), params).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        Ok(definition::handle_definition(Arc::clone(&self.state), params).await)
    }
}
