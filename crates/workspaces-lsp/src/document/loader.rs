//! Loading manifests the client has not opened.
//!
//! A definition request can arrive for a document the server never saw a
//! didOpen for (the editor had it open before the server started). Handlers
//! fall back to reading it from disk.

use tower_lsp_server::ls_types::Uri;
use workspaces_core::{Result, WorkspacesError};

/// Maximum allowed file size in bytes (10MB).
const MAX_FILE_SIZE: u64 = 10_000_000;

/// Loads document content from disk.
///
/// # Errors
///
/// - `WorkspacesError::InvalidUri` - URI is not a file:// URI
/// - `WorkspacesError::FileTooLarge` - file exceeds the size limit
/// - `WorkspacesError::Io` - file missing, unreadable, or not UTF-8
pub async fn load_document_from_disk(uri: &Uri) -> Result<String> {
    let Some(path) = uri.to_file_path() else {
        tracing::debug!("Cannot load non-file URI: {:?}", uri);
        return Err(WorkspacesError::InvalidUri(format!("{:?}", uri)));
    };

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| WorkspacesError::io("reading metadata of", &*path, e))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(WorkspacesError::FileTooLarge {
            path: path.into_owned(),
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| WorkspacesError::io("reading", &*path, e))?;

    tracing::debug!("Loaded {} from disk ({} bytes)", path.display(), content.len());
    Ok(content)
}
