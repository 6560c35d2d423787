//! Completion items for dependency entries in `package.json`.
//!
//! Each item inserts a complete `"name": "range"` pair using the range syntax
//! the detected manager accepts. Workspace packages come first, then catalog
//! entries, each group in scan order.

use crate::catalog::CatalogEntry;
use crate::discovery::WorkspacePackage;
use crate::registry::RegistrySnapshot;
use serde_json::Value;
use tower_lsp_server::ls_types::{CompletionItem, CompletionItemKind, Documentation};

/// Builds the completion list for `snapshot`.
///
/// Returns an empty list when the package manager is unknown.
pub fn completions(snapshot: &RegistrySnapshot) -> Vec<CompletionItem> {
    let support = snapshot.package_manager.support();
    let Some(workspace_range) = support.workspace_range() else {
        return Vec::new();
    };

    let catalog_count = if support.supports_catalogs() {
        snapshot.catalogs.len()
    } else {
        0
    };
    let mut items = Vec::with_capacity(snapshot.packages.len() + catalog_count);

    items.extend(
        snapshot
            .packages
            .iter()
            .map(|package| workspace_item(package, workspace_range)),
    );

    if support.supports_catalogs() {
        items.extend(snapshot.catalogs.iter().map(catalog_item));
    }

    items
}

fn workspace_item(package: &WorkspacePackage, range: &str) -> CompletionItem {
    CompletionItem {
        label: format!("\"{}\"", package.name),
        kind: Some(CompletionItemKind::MODULE),
        detail: Some(package.path.display().to_string()),
        insert_text: Some(format!("\"{}\": \"{}\"", package.name, range)),
        data: Some(Value::String(package.name.clone())),
        ..Default::default()
    }
}

fn catalog_item(entry: &CatalogEntry) -> CompletionItem {
    CompletionItem {
        label: format!("\"{}\"", entry.dependency_name),
        kind: Some(CompletionItemKind::MODULE),
        detail: Some(format!("{} ({})", entry.version_range, entry.protocol())),
        insert_text: Some(format!(
            "\"{}\": \"{}\"",
            entry.dependency_name,
            entry.protocol()
        )),
        data: Some(Value::String(entry.dependency_name.clone())),
        ..Default::default()
    }
}

/// Fills in documentation for a workspace package item.
///
/// Items that already carry documentation, or that do not name a workspace
/// package, are returned unchanged.
pub fn resolve_completion(snapshot: &RegistrySnapshot, mut item: CompletionItem) -> CompletionItem {
    if item.documentation.is_some() {
        return item;
    }

    let Some(package) = item
        .data
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|name| snapshot.package(name))
    else {
        return item;
    };

    let mut doc = package.name.clone();
    if let Some(version) = &package.manifest.version {
        doc.push('@');
        doc.push_str(version);
    }
    if let Some(description) = &package.manifest.description {
        doc.push_str("\n\n");
        doc.push_str(description);
    }
    item.documentation = Some(Documentation::String(doc));
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_CATALOG;
    use crate::manifest::PackageManifest;
    use crate::package_manager::PackageManagerKind;
    use std::path::PathBuf;

    fn package(name: &str) -> WorkspacePackage {
        WorkspacePackage {
            name: name.into(),
            path: PathBuf::from(format!("/ws/packages/{name}")),
            manifest: PackageManifest {
                name: Some(name.into()),
                version: Some("1.2.3".into()),
                description: Some(format!("The {name} package")),
                ..Default::default()
            },
        }
    }

    fn entry(catalog: &str, dep: &str, range: &str) -> CatalogEntry {
        CatalogEntry {
            catalog_name: catalog.into(),
            dependency_name: dep.into(),
            version_range: range.into(),
        }
    }

    fn snapshot(kind: PackageManagerKind) -> RegistrySnapshot {
        RegistrySnapshot {
            root: Some(PathBuf::from("/ws")),
            package_manager: kind,
            packages: vec![package("pkg-b"), package("pkg-a")],
            catalogs: vec![
                entry(DEFAULT_CATALOG, "lodash", "^4.0.0"),
                entry("testing", "vitest", "^1.0.0"),
            ],
        }
    }

    fn inserts(items: &[CompletionItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|i| i.insert_text.as_deref())
            .collect()
    }

    #[test]
    fn test_unknown_manager_yields_nothing() {
        assert!(completions(&snapshot(PackageManagerKind::Unknown)).is_empty());
        assert!(completions(&RegistrySnapshot::default()).is_empty());
    }

    #[test]
    fn test_npm_uses_star_range() {
        let items = completions(&snapshot(PackageManagerKind::Npm));
        assert_eq!(
            inserts(&items),
            vec![r#""pkg-b": "*""#, r#""pkg-a": "*""#]
        );
    }

    #[test]
    fn test_yarn_uses_workspace_protocol() {
        let items = completions(&snapshot(PackageManagerKind::Yarn));
        assert_eq!(
            inserts(&items),
            vec![r#""pkg-b": "workspace:*""#, r#""pkg-a": "workspace:*""#]
        );
        assert_eq!(items[0].label, "\"pkg-b\"");
        assert_eq!(items[0].kind, Some(CompletionItemKind::MODULE));
        assert_eq!(items[0].data, Some(Value::String("pkg-b".into())));
        assert_eq!(items[0].detail.as_deref(), Some("/ws/packages/pkg-b"));
    }

    #[test]
    fn test_pnpm_adds_catalog_items_after_workspace_items() {
        let items = completions(&snapshot(PackageManagerKind::Pnpm));
        assert_eq!(
            inserts(&items),
            vec![
                r#""pkg-b": "workspace:*""#,
                r#""pkg-a": "workspace:*""#,
                r#""lodash": "catalog:""#,
                r#""vitest": "catalog:testing""#,
            ]
        );
        assert_eq!(items[2].detail.as_deref(), Some("^4.0.0 (catalog:)"));
    }

    #[test]
    fn test_bun_adds_catalog_items() {
        let items = completions(&snapshot(PackageManagerKind::Bun));
        assert_eq!(items.len(), 4);
        assert_eq!(
            items[3].insert_text.as_deref(),
            Some(r#""vitest": "catalog:testing""#)
        );
    }

    #[test]
    fn test_resolve_adds_package_documentation() {
        let snap = snapshot(PackageManagerKind::Yarn);
        let item = completions(&snap).remove(1);
        let resolved = resolve_completion(&snap, item);
        assert_eq!(
            resolved.documentation,
            Some(Documentation::String(
                "pkg-a@1.2.3\n\nThe pkg-a package".into()
            ))
        );
    }

    #[test]
    fn test_resolve_leaves_catalog_items_unchanged() {
        let snap = snapshot(PackageManagerKind::Pnpm);
        let item = completions(&snap).remove(2);
        let resolved = resolve_completion(&snap, item.clone());
        assert_eq!(resolved, item);
    }
}
