//! Completion handler implementation.
//!
//! Items do not depend on the cursor: the list is the workspace's packages
//! and catalog entries, and the client filters by what has been typed.

use crate::document::ServerState;
use crate::handlers::is_manifest_uri;
use std::sync::Arc;
use tower_lsp_server::ls_types::{CompletionItem, CompletionParams, CompletionResponse};
use workspaces_core::{completions, resolve_completion};

/// Handles completion requests for `package.json` documents.
pub async fn handle_completion(
    state: Arc<ServerState>,
    params: CompletionParams,
) -> Option<CompletionResponse> {
    let uri = &params.text_document_position.text_document.uri;
    if !is_manifest_uri(uri) {
        return None;
    }

    let items = completions(&state.snapshot());
    tracing::debug!("{} completion item(s) for {:?}", items.len(), uri);

    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// Handles `completionItem/resolve`.
pub async fn handle_completion_resolve(
    state: Arc<ServerState>,
    item: CompletionItem,
) -> CompletionItem {
    resolve_completion(&state.snapshot(), item)
}
