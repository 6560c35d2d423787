//! Diagnostics handler implementation.
//!
//! Reports declared dependencies that are not installed in `node_modules`.

use crate::config::WorkspacesConfig;
use crate::document::ServerState;
use std::sync::Arc;
use tower_lsp_server::ls_types::{Diagnostic, Uri};
use workspaces_core::{Result, WorkspacesError, validate_manifest};

/// Computes diagnostics for an open manifest.
///
/// Returns an empty list when diagnostics are disabled or the document is
/// not open.
///
/// # Errors
///
/// Fails when the URI is not a file path or the manifest is not valid JSON;
/// the caller logs the error and leaves the published diagnostics alone.
pub async fn handle_diagnostics(
    state: Arc<ServerState>,
    uri: &Uri,
    config: &WorkspacesConfig,
) -> Result<Vec<Diagnostic>> {
    if !config.diagnostics.enabled {
        return Ok(Vec::new());
    }

    let content = match state.get_document(uri) {
        Some(doc) => doc.content.clone(),
        None => {
            tracing::warn!("Document not found for diagnostics: {:?}", uri);
            return Ok(Vec::new());
        }
    };

    let document_path = uri
        .to_file_path()
        .ok_or_else(|| WorkspacesError::InvalidUri(format!("{:?}", uri)))?;

    let snapshot = state.snapshot();
    validate_manifest(
        &content,
        &document_path,
        snapshot.root.as_deref(),
        &config.validation_options(),
    )
    .await
}
