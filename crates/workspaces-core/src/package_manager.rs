//! Package manager detection and per-manager behaviour.
//!
//! The manager governing a workspace is decided by which lockfile sits at the
//! workspace root. Everything that differs between managers (dependency range
//! syntax, catalog support, where catalogs are declared) lives behind
//! [`PackageManagerSupport`], selected once from the detected kind.

use crate::catalog::{self, CatalogEntry};
use crate::error::Result;
use crate::manifest::MANIFEST_FILE;
use std::fmt;
use std::path::Path;

/// Package manager governing a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackageManagerKind {
    Yarn,
    Pnpm,
    Npm,
    Bun,
    #[default]
    Unknown,
}

impl PackageManagerKind {
    /// Detection order. Exactly one lockfile is expected; the order only
    /// settles which one wins when several are present.
    pub const DETECTION_ORDER: [Self; 4] = [Self::Yarn, Self::Pnpm, Self::Npm, Self::Bun];

    /// Lockfile names that identify this manager, primary name first.
    pub fn lockfiles(self) -> &'static [&'static str] {
        match self {
            Self::Yarn => &["yarn.lock"],
            Self::Pnpm => &["pnpm-lock.yaml"],
            Self::Npm => &["package-lock.json"],
            Self::Bun => &["bun.lock", "bun.lockb"],
            Self::Unknown => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Npm => "npm",
            Self::Bun => "bun",
            Self::Unknown => "unknown",
        }
    }

    /// Strategy object for this manager.
    pub fn support(self) -> &'static dyn PackageManagerSupport {
        match self {
            Self::Yarn => &YarnSupport,
            Self::Pnpm => &PnpmSupport,
            Self::Npm => &NpmSupport,
            Self::Bun => &BunSupport,
            Self::Unknown => &UnknownSupport,
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the package manager from the lockfile present at `workspace_root`.
///
/// Pure existence check: a missing or unreadable root yields
/// [`PackageManagerKind::Unknown`].
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use workspaces_core::package_manager::{PackageManagerKind, detect};
///
/// let kind = detect(Path::new("/path/to/workspace"));
/// if kind == PackageManagerKind::Unknown {
///     println!("no lockfile");
/// }
/// ```
pub fn detect(workspace_root: &Path) -> PackageManagerKind {
    let detected = PackageManagerKind::DETECTION_ORDER
        .into_iter()
        .find(|kind| {
            kind.lockfiles()
                .iter()
                .any(|lockfile| workspace_root.join(lockfile).exists())
        })
        .unwrap_or_default();

    tracing::debug!(
        "Detected package manager {} in {}",
        detected,
        workspace_root.display()
    );

    detected
}

/// Manager-specific behaviour used by the registry and completion engine.
pub trait PackageManagerSupport: Send + Sync {
    fn kind(&self) -> PackageManagerKind;

    /// Range a manifest uses to depend on a sibling workspace package.
    /// `None` disables workspace-aware completion entirely.
    fn workspace_range(&self) -> Option<&'static str>;

    fn supports_catalogs(&self) -> bool {
        false
    }

    /// Reads catalog declarations for the workspace at `root`.
    fn load_catalogs(&self, _root: &Path) -> Result<Vec<CatalogEntry>> {
        Ok(Vec::new())
    }

    /// Files whose changes should trigger a registry refresh.
    fn watched_files(&self) -> Vec<&'static str> {
        let mut files = self.kind().lockfiles().to_vec();
        files.push(MANIFEST_FILE);
        files
    }
}

pub struct NpmSupport;

impl PackageManagerSupport for NpmSupport {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Npm
    }

    fn workspace_range(&self) -> Option<&'static str> {
        Some("*")
    }
}

pub struct YarnSupport;

impl PackageManagerSupport for YarnSupport {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Yarn
    }

    fn workspace_range(&self) -> Option<&'static str> {
        Some("workspace:*")
    }
}

pub struct PnpmSupport;

impl PackageManagerSupport for PnpmSupport {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Pnpm
    }

    fn workspace_range(&self) -> Option<&'static str> {
        Some("workspace:*")
    }

    fn supports_catalogs(&self) -> bool {
        true
    }

    fn load_catalogs(&self, root: &Path) -> Result<Vec<CatalogEntry>> {
        catalog::load_pnpm_catalogs(root)
    }

    fn watched_files(&self) -> Vec<&'static str> {
        vec!["pnpm-lock.yaml", catalog::PNPM_WORKSPACE_FILE, MANIFEST_FILE]
    }
}

pub struct BunSupport;

impl PackageManagerSupport for BunSupport {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Bun
    }

    fn workspace_range(&self) -> Option<&'static str> {
        Some("workspace:*")
    }

    fn supports_catalogs(&self) -> bool {
        true
    }

    fn load_catalogs(&self, root: &Path) -> Result<Vec<CatalogEntry>> {
        catalog::load_bun_catalogs(root)
    }
}

pub struct UnknownSupport;

impl PackageManagerSupport for UnknownSupport {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Unknown
    }

    fn workspace_range(&self) -> Option<&'static str> {
        None
    }
}
