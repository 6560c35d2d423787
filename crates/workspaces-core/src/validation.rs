//! Diagnostics for declared dependencies missing from `node_modules`.
//!
//! The installed set is built from the `node_modules` next to the manifest and
//! the one at the workspace root, plus the scope directories of any scoped
//! dependency. A directory that cannot be listed contributes nothing; it never
//! aborts validation.

use crate::analyzer::{ManifestAnalyzer, RegexManifestAnalyzer};
use crate::error::{Result, WorkspacesError};
use crate::manifest::MANIFEST_FILE;
use crate::position::LineIndex;
use futures::future::{join, join_all};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity};

pub const DIAGNOSTIC_SOURCE: &str = "npm-workspaces-lsp";

const NODE_MODULES: &str = "node_modules";

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub severity: DiagnosticSeverity,
    /// Upper bound for listing one directory.
    pub scan_timeout: Duration,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            severity: DiagnosticSeverity::WARNING,
            scan_timeout: Duration::from_secs(5),
        }
    }
}

/// Whether `path` names a manifest this server validates.
pub fn is_manifest(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE)
}

/// Validates a manifest and returns one diagnostic per declared dependency
/// that is not installed.
///
/// # Errors
///
/// Returns [`WorkspacesError::Json`] when the manifest is not valid JSON.
/// Filesystem failures are never errors.
pub async fn validate_manifest(
    text: &str,
    document_path: &Path,
    workspace_root: Option<&Path>,
    options: &ValidationOptions,
) -> Result<Vec<Diagnostic>> {
    let manifest: Value = serde_json::from_str(text).map_err(|source| WorkspacesError::Json {
        file_type: document_path.display().to_string(),
        source,
    })?;

    let Some(declared) = declared_dependencies(&manifest) else {
        return Ok(Vec::new());
    };

    let document_dir = document_path.parent().unwrap_or(Path::new(""));
    let installed = installed_packages(
        document_dir,
        workspace_root,
        declared.iter().map(String::as_str),
        options.scan_timeout,
    )
    .await;

    let mut missing: Vec<_> = RegexManifestAnalyzer
        .all_dependency_spans(text)
        .into_values()
        .filter(|span| declared.contains(&span.name) && !installed.contains(&span.name))
        .collect();
    missing.sort_by_key(|span| span.start);

    let index = LineIndex::new(text);
    Ok(missing
        .into_iter()
        .map(|span| Diagnostic {
            range: index.range(span.start, span.end),
            severity: Some(options.severity),
            message: format!("{} is not installed", span.name),
            source: Some(DIAGNOSTIC_SOURCE.into()),
            ..Default::default()
        })
        .collect())
}

/// Names declared in `dependencies` and `devDependencies`, or `None` when
/// neither field exists.
fn declared_dependencies(manifest: &Value) -> Option<BTreeSet<String>> {
    let fields: Vec<_> = ["dependencies", "devDependencies"]
        .into_iter()
        .filter_map(|field| manifest.get(field))
        .collect();

    if fields.is_empty() {
        return None;
    }

    Some(
        fields
            .into_iter()
            .filter_map(Value::as_object)
            .flat_map(|deps| deps.keys().cloned())
            .collect(),
    )
}

/// Collects installed package names visible from `document_dir`.
///
/// Lists `<document_dir>/node_modules` and `<workspace_root>/node_modules`
/// concurrently, and for each scope among `declared` lists the scope
/// directory, preferring the local `node_modules` over the root one.
pub async fn installed_packages<'a>(
    document_dir: &Path,
    workspace_root: Option<&Path>,
    declared: impl IntoIterator<Item = &'a str>,
    timeout: Duration,
) -> HashSet<String> {
    let local = document_dir.join(NODE_MODULES);
    let hoisted = workspace_root
        .map(|root| root.join(NODE_MODULES))
        .filter(|hoisted| *hoisted != local);

    let mut roots = vec![local.clone()];
    roots.extend(hoisted.clone());

    let scopes: BTreeSet<&str> = declared
        .into_iter()
        .filter(|name| name.contains('/'))
        .filter_map(|name| name.split('/').next())
        .filter(|scope| !scope.is_empty())
        .collect();

    let flat = join_all(roots.into_iter().map(|dir| list_or_empty(dir, timeout)));
    let scoped = join_all(
        scopes
            .into_iter()
            .map(|scope| list_scope(scope, &local, hoisted.as_deref(), timeout)),
    );
    let (flat, scoped) = join(flat, scoped).await;

    flat.into_iter().chain(scoped).flatten().collect()
}

async fn list_scope(
    scope: &str,
    local: &Path,
    hoisted: Option<&Path>,
    timeout: Duration,
) -> Vec<String> {
    let entries = match list_dir(local.join(scope), timeout).await {
        Ok(entries) => entries,
        Err(local_err) => match hoisted {
            Some(hoisted) => {
                tracing::trace!("{}; trying workspace root", local_err);
                list_dir(hoisted.join(scope), timeout)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::debug!("{}", e);
                        Vec::new()
                    })
            }
            None => {
                tracing::debug!("{}", local_err);
                Vec::new()
            }
        },
    };

    entries
        .into_iter()
        .map(|entry| format!("{scope}/{entry}"))
        .collect()
}

async fn list_or_empty(dir: PathBuf, timeout: Duration) -> Vec<String> {
    list_dir(dir, timeout).await.unwrap_or_else(|e| {
        tracing::debug!("{}", e);
        Vec::new()
    })
}

async fn list_dir(dir: PathBuf, timeout: Duration) -> Result<Vec<String>> {
    let listing = async {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| WorkspacesError::io("listing", &dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorkspacesError::io("listing", &dir, e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    };

    match tokio::time::timeout(timeout, listing).await {
        Ok(result) => result,
        Err(_) => Err(WorkspacesError::Timeout {
            operation: "listing",
            path: dir.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
