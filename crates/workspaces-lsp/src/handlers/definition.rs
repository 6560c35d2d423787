//! Go-to-definition handler implementation.

use crate::document::ServerState;
use crate::handlers::is_manifest_uri;
use std::sync::Arc;
use tower_lsp_server::ls_types::{GotoDefinitionParams, GotoDefinitionResponse};
use workspaces_core::resolve_definition;

/// Handles definition requests on dependency entries.
///
/// Works for documents the client never opened by reading them from disk.
pub async fn handle_definition(
    state: Arc<ServerState>,
    params: GotoDefinitionParams,
) -> Option<GotoDefinitionResponse> {
    let uri = &params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    if !is_manifest_uri(uri) {
        return None;
    }

    let document_path = uri.to_file_path()?.into_owned();
    let text = state.document_text(uri).await?;
    let snapshot = state.snapshot();

    resolve_definition(&snapshot, &document_path, &text, position)
        .await
        .map(GotoDefinitionResponse::Scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentState, WorkspaceContext};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tower_lsp_server::ls_types::{
        Position, TextDocumentIdentifier, TextDocumentPositionParams, Uri,
    };
    use workspaces_core::{RegistryRefresher, WorkspaceRegistry};

    const APP_MANIFEST: &str = r#"{
  "name": "app",
  "dependencies": {
    "pkg-a": "workspace:*"
  }
}"#;

    fn params(uri: Uri, line: u32) -> GotoDefinitionParams {
        GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position::new(line, 6),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        }
    }

    fn workspace(dir: &TempDir) -> Arc<ServerState> {
        let root = dir.path();
        fs::write(
            root.join("package.json"),
            r#"{"workspaces": ["packages/*", "apps/*"]}"#,
        )
        .unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::create_dir_all(root.join("packages/pkg-a")).unwrap();
        fs::write(root.join("packages/pkg-a/package.json"), r#"{"name": "pkg-a"}"#).unwrap();
        fs::create_dir_all(root.join("apps/app")).unwrap();
        fs::write(root.join("apps/app/package.json"), APP_MANIFEST).unwrap();

        let registry = Arc::new(WorkspaceRegistry::load(Some(root.to_path_buf())));
        let state = Arc::new(ServerState::new());
        state.set_workspace(WorkspaceContext {
            refresher: RegistryRefresher::spawn(Arc::clone(&registry)),
            registry,
        });
        state
    }

    fn target(response: GotoDefinitionResponse) -> PathBuf {
        match response {
            GotoDefinitionResponse::Scalar(location) => {
                location.uri.to_file_path().unwrap().into_owned()
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_definition_from_open_document() {
        let dir = TempDir::new().unwrap();
        let state = workspace(&dir);
        let uri = Uri::from_file_path(dir.path().join("apps/app/package.json")).unwrap();
        state.update_document(uri.clone(), DocumentState::new(APP_MANIFEST.into(), Some(1)));

        let response = handle_definition(state, params(uri, 3)).await.unwrap();
        assert_eq!(
            target(response),
            dir.path().join("packages/pkg-a/package.json")
        );
    }

    #[tokio::test]
    async fn test_definition_loads_unopened_document() {
        let dir = TempDir::new().unwrap();
        let state = workspace(&dir);
        let uri = Uri::from_file_path(dir.path().join("apps/app/package.json")).unwrap();

        let response = handle_definition(state, params(uri, 3)).await.unwrap();
        assert_eq!(
            target(response),
            dir.path().join("packages/pkg-a/package.json")
        );
    }

    #[tokio::test]
    async fn test_definition_on_non_dependency_line() {
        let dir = TempDir::new().unwrap();
        let state = workspace(&dir);
        let uri = Uri::from_file_path(dir.path().join("apps/app/package.json")).unwrap();

        assert!(handle_definition(state, params(uri, 2)).await.is_none());
    }

    #[tokio::test]
    async fn test_definition_without_workspace() {
        let state = Arc::new(ServerState::new());
        let uri = Uri::from_file_path("/ws/package.json").unwrap();
        state.update_document(uri.clone(), DocumentState::new(APP_MANIFEST.into(), None));

        assert!(handle_definition(state, params(uri, 3)).await.is_none());
    }
}
