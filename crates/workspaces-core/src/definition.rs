//! Go-to-definition from a dependency entry to the package's manifest.
//!
//! Candidates are tried in module-resolution order: a workspace member with
//! the same name, then `node_modules` next to the edited manifest, then the
//! workspace root's `node_modules`. The first one that exists wins.

use crate::analyzer::dependency_key_on_line;
use crate::manifest::MANIFEST_FILE;
use crate::position::LineIndex;
use crate::registry::RegistrySnapshot;
use std::path::{Component, Path, PathBuf};
use tower_lsp_server::ls_types::{Location, Position, Range, Uri};

const NODE_MODULES: &str = "node_modules";

/// Candidate manifest paths for `name`, in priority order.
pub fn candidate_paths(
    snapshot: &RegistrySnapshot,
    root: &Path,
    document_path: &Path,
    name: &str,
) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);

    if let Some(package) = snapshot.package(name) {
        candidates.push(package.manifest_path());
    }

    if let Some(document_dir) = document_path.parent() {
        candidates.push(document_dir.join(NODE_MODULES).join(name).join(MANIFEST_FILE));
    }

    candidates.push(root.join(NODE_MODULES).join(name).join(MANIFEST_FILE));
    candidates
}

/// Whether `name` stays below the directory it is joined onto: relative,
/// with plain components only (`@scope/name` has two).
fn is_package_path(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Resolves the dependency on the line at `position` to the manifest file of
/// the package it names.
///
/// Returns `None` when there is no workspace root, the line is not a
/// dependency entry, or no candidate exists on disk. The location is
/// zero-length at the start of the file.
pub async fn resolve_definition(
    snapshot: &RegistrySnapshot,
    document_path: &Path,
    text: &str,
    position: Position,
) -> Option<Location> {
    let root = snapshot.root.as_deref()?;

    let line = LineIndex::new(text).line(position.line)?;
    let name = dependency_key_on_line(line)?;
    if !is_package_path(name) {
        tracing::debug!("Ignoring dependency key {:?} outside node_modules", name);
        return None;
    }

    for candidate in candidate_paths(snapshot, root, document_path, name) {
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            tracing::debug!("Resolved {} to {}", name, candidate.display());
            let uri = Uri::from_file_path(&candidate)?;
            return Some(Location::new(uri, Range::default()));
        }
    }

    tracing::debug!("No installed location for {}", name);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::scan_workspace;
    use std::fs;
    use tempfile::TempDir;

    const APP_MANIFEST: &str = r#"{
  "name": "app",
  "dependencies": {
    "pkg-a": "workspace:*",
    "left-pad": "^1.0.0",
    "missing": "^1.0.0"
  }
}"#;

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root.join("package.json"),
            r#"{"workspaces": ["packages/*", "apps/*"]}"#,
        );
        write(root.join("yarn.lock"), "");
        write(root.join("packages/pkg-a/package.json"), r#"{"name": "pkg-a"}"#);
        write(root.join("apps/app/package.json"), APP_MANIFEST);
        write(
            root.join("node_modules/pkg-a/package.json"),
            r#"{"name": "pkg-a"}"#,
        );
        write(
            root.join("node_modules/left-pad/package.json"),
            r#"{"name": "left-pad"}"#,
        );
        dir
    }

    fn target(location: &Location) -> PathBuf {
        location.uri.to_file_path().unwrap().into_owned()
    }

    #[tokio::test]
    async fn test_workspace_package_wins_over_node_modules() {
        let dir = workspace();
        let root = dir.path();
        let snapshot = scan_workspace(root);
        let document = root.join("apps/app/package.json");

        let location = resolve_definition(&snapshot, &document, APP_MANIFEST, Position::new(3, 8))
            .await
            .unwrap();

        assert_eq!(target(&location), root.join("packages/pkg-a/package.json"));
        assert_eq!(location.range, Range::default());
    }

    #[tokio::test]
    async fn test_local_node_modules_wins_over_root() {
        let dir = workspace();
        let root = dir.path();
        write(
            root.join("apps/app/node_modules/left-pad/package.json"),
            r#"{"name": "left-pad"}"#,
        );
        let snapshot = scan_workspace(root);
        let document = root.join("apps/app/package.json");

        let location = resolve_definition(&snapshot, &document, APP_MANIFEST, Position::new(4, 6))
            .await
            .unwrap();

        assert_eq!(
            target(&location),
            root.join("apps/app/node_modules/left-pad/package.json")
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_root_node_modules() {
        let dir = workspace();
        let root = dir.path();
        let snapshot = scan_workspace(root);
        let document = root.join("apps/app/package.json");

        let location = resolve_definition(&snapshot, &document, APP_MANIFEST, Position::new(4, 6))
            .await
            .unwrap();

        assert_eq!(
            target(&location),
            root.join("node_modules/left-pad/package.json")
        );
    }

    #[tokio::test]
    async fn test_unresolved_dependency() {
        let dir = workspace();
        let snapshot = scan_workspace(dir.path());
        let document = dir.path().join("apps/app/package.json");

        let result =
            resolve_definition(&snapshot, &document, APP_MANIFEST, Position::new(5, 6)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_non_dependency_line() {
        let dir = workspace();
        let snapshot = scan_workspace(dir.path());
        let document = dir.path().join("apps/app/package.json");

        for line in [0, 2, 6, 40] {
            let result =
                resolve_definition(&snapshot, &document, APP_MANIFEST, Position::new(line, 0))
                    .await;
            assert!(result.is_none(), "line {line}");
        }
    }

    #[tokio::test]
    async fn test_keys_escaping_node_modules_are_ignored() {
        let dir = workspace();
        let root = dir.path();
        write(root.join("outside/package.json"), r#"{"name": "outside"}"#);
        let snapshot = scan_workspace(root);
        let document = root.join("apps/app/package.json");
        let escape = root.join("outside").display().to_string();

        for key in ["../outside", "../../outside", escape.as_str()] {
            let text = format!("{{\n  \"dependencies\": {{\n    \"{key}\": \"1\"\n  }}\n}}");
            let result = resolve_definition(&snapshot, &document, &text, Position::new(2, 6)).await;
            assert!(result.is_none(), "key {key}");
        }
    }

    #[test]
    fn test_is_package_path() {
        assert!(is_package_path("left-pad"));
        assert!(is_package_path("@scope/pkg"));
        assert!(!is_package_path("../x"));
        assert!(!is_package_path("@scope/../../x"));
        assert!(!is_package_path("/etc"));
    }

    #[tokio::test]
    async fn test_requires_workspace_root() {
        let snapshot = RegistrySnapshot::default();
        let result = resolve_definition(
            &snapshot,
            Path::new("/ws/package.json"),
            APP_MANIFEST,
            Position::new(3, 8),
        )
        .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_candidate_order() {
        let dir = workspace();
        let root = dir.path();
        let snapshot = scan_workspace(root);
        let document = root.join("apps/app/package.json");

        let candidates = candidate_paths(&snapshot, root, &document, "pkg-a");
        assert_eq!(
            candidates,
            vec![
                root.join("packages/pkg-a/package.json"),
                root.join("apps/app/node_modules/pkg-a/package.json"),
                root.join("node_modules/pkg-a/package.json"),
            ]
        );

        let candidates = candidate_paths(&snapshot, root, &document, "left-pad");
        assert_eq!(candidates.len(), 2);
    }
}
