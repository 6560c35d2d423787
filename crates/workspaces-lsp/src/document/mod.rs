//! Open documents and the workspace context shared by every handler.

mod loader;

pub use loader::load_document_from_disk;

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_lsp_server::ls_types::Uri;
use workspaces_core::{RegistryRefresher, RegistrySnapshot, WorkspaceRegistry};

/// Text of an open document as last synchronised by the client.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub content: String,
    pub version: Option<i32>,
}

impl DocumentState {
    pub fn new(content: String, version: Option<i32>) -> Self {
        Self { content, version }
    }
}

/// Registry plus the refresh task feeding it. Set once per session.
pub struct WorkspaceContext {
    pub registry: Arc<WorkspaceRegistry>,
    pub refresher: RegistryRefresher,
}

/// Shared server state.
pub struct ServerState {
    pub documents: DashMap<Uri, DocumentState>,
    workspace: OnceLock<WorkspaceContext>,
    tasks: RwLock<HashMap<Uri, JoinHandle<()>>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            workspace: OnceLock::new(),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_document(&self, uri: &Uri) -> Option<Ref<'_, Uri, DocumentState>> {
        self.documents.get(uri)
    }

    pub fn update_document(&self, uri: Uri, state: DocumentState) {
        self.documents.insert(uri, state);
    }

    pub fn remove_document(&self, uri: &Uri) -> Option<DocumentState> {
        self.documents.remove(uri).map(|(_, doc)| doc)
    }

    /// Document text from the open-document map, or from disk when the
    /// client never opened it.
    pub async fn document_text(&self, uri: &Uri) -> Option<String> {
        if let Some(doc) = self.get_document(uri) {
            return Some(doc.content.clone());
        }

        match load_document_from_disk(uri).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!("Cannot read {:?}: {}", uri, e);
                None
            }
        }
    }

    /// Installs the workspace context. Returns `false` if one was already
    /// installed, in which case `context` is dropped.
    pub fn set_workspace(&self, context: WorkspaceContext) -> bool {
        self.workspace.set(context).is_ok()
    }

    pub fn workspace(&self) -> Option<&WorkspaceContext> {
        self.workspace.get()
    }

    /// Current registry snapshot; empty before `initialize`.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.workspace
            .get()
            .map(|ctx| ctx.registry.snapshot())
            .unwrap_or_default()
    }

    /// Tracks `task` as the background work for `uri`, aborting whatever was
    /// running for it before.
    pub async fn spawn_background_task(&self, uri: Uri, task: JoinHandle<()>) {
        let mut tasks = self.tasks.write().await;
        if let Some(previous) = tasks.insert(uri, task) {
            previous.abort();
        }
    }

    pub async fn cancel_background_task(&self, uri: &Uri) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.remove(uri) {
            task.abort();
        }
    }

    pub async fn cancel_all_background_tasks(&self) {
        let mut tasks = self.tasks.write().await;
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
