//! Workspace registry: the current snapshot of member packages and catalogs.
//!
//! A snapshot is immutable. Refreshing scans the workspace into a new
//! snapshot and publishes it through a `watch` channel, so readers always see
//! either the previous snapshot or the next one, never a mix.

use crate::catalog::CatalogEntry;
use crate::discovery::{WorkspacePackage, discover_packages};
use crate::package_manager::{PackageManagerKind, detect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Consistent view of the workspace at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub root: Option<PathBuf>,
    pub package_manager: PackageManagerKind,
    pub packages: Vec<WorkspacePackage>,
    pub catalogs: Vec<CatalogEntry>,
}

impl RegistrySnapshot {
    /// Looks up a member package by name.
    pub fn package(&self, name: &str) -> Option<&WorkspacePackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.catalogs.is_empty()
    }
}

/// Scans the workspace at `root` into a fresh snapshot.
///
/// Never fails: discovery or catalog errors are logged and leave the
/// corresponding part of the snapshot empty.
pub fn scan_workspace(root: &Path) -> RegistrySnapshot {
    let package_manager = detect(root);

    let packages = discover_packages(root).unwrap_or_else(|e| {
        tracing::warn!("Workspace discovery failed: {}", e);
        Vec::new()
    });

    let support = package_manager.support();
    let catalogs = if support.supports_catalogs() {
        support.load_catalogs(root).unwrap_or_else(|e| {
            tracing::warn!("Failed to load {} catalogs: {}", package_manager, e);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    tracing::info!(
        "Scanned {} workspace at {}: {} package(s), {} catalog entr(ies)",
        package_manager,
        root.display(),
        packages.len(),
        catalogs.len()
    );

    RegistrySnapshot {
        root: Some(root.to_path_buf()),
        package_manager,
        packages,
        catalogs,
    }
}

/// Owner of the current [`RegistrySnapshot`].
pub struct WorkspaceRegistry {
    root: Option<PathBuf>,
    snapshot: watch::Sender<Arc<RegistrySnapshot>>,
}

impl WorkspaceRegistry {
    /// Creates a registry for `root` holding an empty snapshot until the
    /// first [`refresh`](Self::refresh). `None` builds a degraded registry
    /// that stays empty.
    pub fn new(root: Option<PathBuf>) -> Self {
        let initial = RegistrySnapshot {
            root: root.clone(),
            ..Default::default()
        };
        Self {
            root,
            snapshot: watch::Sender::new(Arc::new(initial)),
        }
    }

    /// Creates a registry and performs the initial scan.
    pub fn load(root: Option<PathBuf>) -> Self {
        let registry = Self::new(root);
        registry.refresh();
        registry
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Last published snapshot. Never blocks on a scan in progress.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Re-scans the workspace and publishes the result.
    ///
    /// Performs blocking filesystem I/O; async callers run it on a blocking
    /// thread.
    pub fn refresh(&self) -> Arc<RegistrySnapshot> {
        let snapshot = Arc::new(match &self.root {
            Some(root) => scan_workspace(root),
            None => RegistrySnapshot::default(),
        });
        self.snapshot.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RegistrySnapshot>> {
        self.snapshot.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pnpm_workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("package.json"), r#"{"name": "root"}"#).unwrap();
        fs::write(root.join("pnpm-lock.yaml"), "lockfileVersion: '9.0'\n").unwrap();
        fs::write(
            root.join("pnpm-workspace.yaml"),
            "packages:\n  - packages/*\ncatalog:\n  lodash: ^4.0.0\ncatalogs:\n  testing:\n    vitest: ^1.0.0\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("packages/pkg-a")).unwrap();
        fs::write(
            root.join("packages/pkg-a/package.json"),
            r#"{"name": "pkg-a"}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_scan_pnpm_workspace() {
        let dir = pnpm_workspace();
        let snapshot = scan_workspace(dir.path());

        assert_eq!(snapshot.package_manager, PackageManagerKind::Pnpm);
        assert_eq!(snapshot.packages.len(), 1);
        assert!(snapshot.package("pkg-a").is_some());
        assert!(snapshot.package("missing").is_none());
        assert_eq!(snapshot.catalogs.len(), 2);
    }

    #[test]
    fn test_scan_skips_catalogs_for_npm() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(
            root.join("package.json"),
            r#"{"workspaces": [], "catalog": {"lodash": "^4.0.0"}}"#,
        )
        .unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();

        let snapshot = scan_workspace(root);
        assert_eq!(snapshot.package_manager, PackageManagerKind::Npm);
        assert!(snapshot.catalogs.is_empty());
    }

    #[test]
    fn test_degraded_registry() {
        let registry = WorkspaceRegistry::load(None);
        let snapshot = registry.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.package_manager, PackageManagerKind::Unknown);
        assert!(registry.root().is_none());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let dir = pnpm_workspace();
        let registry = WorkspaceRegistry::new(Some(dir.path().to_path_buf()));

        let first = registry.refresh();
        let second = registry.refresh();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.packages, second.packages);
        assert_eq!(first.catalogs, second.catalogs);
    }

    #[test]
    fn test_refresh_replaces_snapshot() {
        let dir = pnpm_workspace();
        let registry = WorkspaceRegistry::new(Some(dir.path().to_path_buf()));
        assert!(registry.snapshot().packages.is_empty());

        let mut rx = registry.subscribe();
        registry.refresh();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().packages.len(), 1);

        fs::create_dir_all(dir.path().join("packages/pkg-b")).unwrap();
        fs::write(
            dir.path().join("packages/pkg-b/package.json"),
            r#"{"name": "pkg-b"}"#,
        )
        .unwrap();

        let held = registry.snapshot();
        registry.refresh();
        assert_eq!(held.packages.len(), 1);
        assert_eq!(registry.snapshot().packages.len(), 2);
    }
}
