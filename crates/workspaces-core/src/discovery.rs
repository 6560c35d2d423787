//! Workspace root lookup and member package enumeration.
//!
//! Member globs come from `pnpm-workspace.yaml` (`packages`) when that file
//! exists, otherwise from the root manifest's `workspaces` field. Globs are
//! matched against directories below the root; `!`-prefixed globs exclude.

use crate::catalog::{PNPM_WORKSPACE_FILE, parse_pnpm_packages, read_pnpm_workspace_file};
use crate::error::{Result, WorkspacesError};
use crate::manifest::{MANIFEST_FILE, PackageManifest, read_manifest};
use crate::package_manager::PackageManagerKind;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into while matching workspace globs.
pub(crate) const PRUNED_DIRS: &[&str] = &["node_modules", ".git"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A member package of the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspacePackage {
    pub name: String,
    /// Absolute package directory.
    pub path: PathBuf,
    pub manifest: PackageManifest,
}

impl WorkspacePackage {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }
}

/// Finds the workspace root governing `start`.
///
/// Returns the nearest ancestor (including `start`) that declares workspaces,
/// either through `pnpm-workspace.yaml` or a `workspaces` field in
/// `package.json`. Falls back to the nearest ancestor holding a known
/// lockfile.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut lockfile_dir = None;

    for dir in start.ancestors() {
        if dir.join(PNPM_WORKSPACE_FILE).is_file() {
            return Some(dir.to_path_buf());
        }

        if let Ok(manifest) = read_manifest(&dir.join(MANIFEST_FILE))
            && manifest.workspaces.is_some()
        {
            return Some(dir.to_path_buf());
        }

        if lockfile_dir.is_none() && has_lockfile(dir) {
            lockfile_dir = Some(dir.to_path_buf());
        }
    }

    if lockfile_dir.is_none() {
        tracing::debug!("No workspace root above {}", start.display());
    }

    lockfile_dir
}

fn has_lockfile(dir: &Path) -> bool {
    PackageManagerKind::DETECTION_ORDER
        .iter()
        .flat_map(|kind| kind.lockfiles())
        .any(|lockfile| dir.join(lockfile).is_file())
}

/// Workspace globs declared at `root`.
pub fn workspace_patterns(root: &Path) -> Result<Vec<String>> {
    if let Some(content) = read_pnpm_workspace_file(root)? {
        return parse_pnpm_packages(&content);
    }

    match read_manifest(&root.join(MANIFEST_FILE)) {
        Ok(manifest) => Ok(manifest.workspace_globs().to_vec()),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn compile_pattern(raw: &str) -> Result<Pattern> {
    let normalized = raw.trim_start_matches("./").trim_end_matches('/');
    Pattern::new(normalized).map_err(|source| WorkspacesError::Glob {
        pattern: raw.to_string(),
        source,
    })
}

/// Resolves workspace globs to directories under `root`.
///
/// Invalid globs are logged and skipped. Results follow a depth-first walk in
/// file-name order, so the same tree always yields the same sequence.
pub fn resolve_glob_patterns(root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut inclusions = Vec::new();
    let mut exclusions = Vec::new();

    for raw in patterns {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, raw.as_str()),
        };

        match compile_pattern(body) {
            Ok(pattern) if negated => exclusions.push(pattern),
            Ok(pattern) => inclusions.push(pattern),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    if inclusions.is_empty() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or("");
            !PRUNED_DIRS.iter().any(|dir| *dir == name)
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir() && entry.path() != root)
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let included = inclusions
                .iter()
                .any(|p| p.matches_path_with(rel, MATCH_OPTIONS));
            let excluded = exclusions
                .iter()
                .any(|p| p.matches_path_with(rel, MATCH_OPTIONS));
            (included && !excluded).then(|| entry.path().to_path_buf())
        })
        .collect()
}

/// Enumerates member packages of the workspace at `root`.
///
/// Directories without a readable, named `package.json` are skipped. When two
/// directories declare the same name the later one wins, keeping the slot of
/// the first.
pub fn discover_packages(root: &Path) -> Result<Vec<WorkspacePackage>> {
    let patterns = workspace_patterns(root)?;
    tracing::debug!(
        "Resolving {} workspace pattern(s) in {}",
        patterns.len(),
        root.display()
    );

    let mut packages: Vec<WorkspacePackage> = Vec::new();

    for dir in resolve_glob_patterns(root, &patterns) {
        let manifest = match read_manifest(&dir.join(MANIFEST_FILE)) {
            Ok(manifest) => manifest,
            Err(e) if e.is_not_found() => continue,
            Err(e) => {
                tracing::warn!("Skipping workspace member: {}", e);
                continue;
            }
        };

        let Some(name) = manifest.name.clone() else {
            tracing::debug!("Skipping unnamed package in {}", dir.display());
            continue;
        };

        let package = WorkspacePackage {
            name,
            path: dir,
            manifest,
        };

        if let Some(existing) = packages.iter_mut().find(|p| p.name == package.name) {
            tracing::warn!(
                "Duplicate workspace package '{}': {} replaces {}",
                package.name,
                package.path.display(),
                existing.path.display()
            );
            *existing = package;
        } else {
            packages.push(package);
        }
    }

    Ok(packages)
}
