//! Catalog declarations for pnpm and bun workspaces.
//!
//! pnpm declares catalogs in `pnpm-workspace.yaml`:
//!
//! ```yaml
//! catalog:
//!   lodash: ^4.0.0
//! catalogs:
//!   testing:
//!     vitest: ^1.0.0
//! ```
//!
//! bun declares the same tables in the root `package.json`, either top-level
//! or inside the object form of `workspaces`. Declaration order is kept.

use crate::error::{Result, WorkspacesError};
use crate::manifest::{MANIFEST_FILE, PackageManifest, WorkspacesField, read_manifest};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use yaml_rust2::{Yaml, YamlLoader};

pub const PNPM_WORKSPACE_FILE: &str = "pnpm-workspace.yaml";

/// Name of the unnamed catalog.
pub const DEFAULT_CATALOG: &str = "default";

/// One dependency pinned by a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub catalog_name: String,
    pub dependency_name: String,
    pub version_range: String,
}

impl CatalogEntry {
    pub fn is_default(&self) -> bool {
        self.catalog_name == DEFAULT_CATALOG
    }

    /// Range a manifest uses to reference this entry: `catalog:` for the
    /// default catalog, `catalog:<name>` otherwise.
    pub fn protocol(&self) -> String {
        if self.is_default() {
            "catalog:".to_string()
        } else {
            format!("catalog:{}", self.catalog_name)
        }
    }
}

/// Accumulates entries, keeping the first declaration of each
/// (catalog, dependency) pair.
#[derive(Default)]
struct CatalogTables {
    entries: Vec<CatalogEntry>,
    seen: HashSet<(String, String)>,
}

impl CatalogTables {
    fn push(&mut self, catalog: &str, dependency: &str, range: String) {
        if !self.seen.insert((catalog.to_string(), dependency.to_string())) {
            tracing::debug!("Ignoring duplicate catalog entry {catalog}/{dependency}");
            return;
        }
        self.entries.push(CatalogEntry {
            catalog_name: catalog.to_string(),
            dependency_name: dependency.to_string(),
            version_range: range,
        });
    }

    fn push_yaml_table(&mut self, catalog: &str, table: &Yaml) {
        let Yaml::Hash(deps) = table else {
            return;
        };
        for (name, range) in deps {
            let (Some(name), Some(range)) = (name.as_str(), yaml_scalar(range)) else {
                continue;
            };
            self.push(catalog, name, range);
        }
    }

    fn push_json_table(&mut self, catalog: &str, table: &Map<String, Value>) {
        for (name, range) in table {
            if let Some(range) = range.as_str() {
                self.push(catalog, name, range.to_string());
            }
        }
    }

    fn push_json_catalogs(
        &mut self,
        catalog: Option<&Map<String, Value>>,
        catalogs: Option<&Map<String, Value>>,
    ) {
        if let Some(table) = catalog {
            self.push_json_table(DEFAULT_CATALOG, table);
        }
        for (name, table) in catalogs.into_iter().flatten() {
            if let Some(table) = table.as_object() {
                self.push_json_table(name, table);
            }
        }
    }
}

/// Version ranges are usually strings, but unquoted YAML like `1.0` or `4`
/// parses as a number.
fn yaml_scalar(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) | Yaml::Real(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Parses the catalog tables of a `pnpm-workspace.yaml` document.
pub fn parse_pnpm_catalogs(content: &str) -> Result<Vec<CatalogEntry>> {
    let docs = YamlLoader::load_from_str(content).map_err(|e| WorkspacesError::Yaml {
        file_type: PNPM_WORKSPACE_FILE.into(),
        message: e.to_string(),
    })?;

    let Some(doc) = docs.first() else {
        return Ok(Vec::new());
    };

    let mut tables = CatalogTables::default();
    tables.push_yaml_table(DEFAULT_CATALOG, &doc["catalog"]);

    if let Yaml::Hash(named) = &doc["catalogs"] {
        for (name, table) in named {
            if let Some(name) = name.as_str() {
                tables.push_yaml_table(name, table);
            }
        }
    }

    Ok(tables.entries)
}

/// Parses the `packages` globs of a `pnpm-workspace.yaml` document.
pub fn parse_pnpm_packages(content: &str) -> Result<Vec<String>> {
    let docs = YamlLoader::load_from_str(content).map_err(|e| WorkspacesError::Yaml {
        file_type: PNPM_WORKSPACE_FILE.into(),
        message: e.to_string(),
    })?;

    let globs = docs
        .first()
        .and_then(|doc| doc["packages"].as_vec())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Ok(globs)
}

/// Reads `pnpm-workspace.yaml` under `root`; `None` when the file is absent.
pub fn read_pnpm_workspace_file(root: &Path) -> Result<Option<String>> {
    let path = root.join(PNPM_WORKSPACE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WorkspacesError::io("reading", path, e)),
    }
}

/// Loads pnpm catalogs for the workspace at `root`.
pub fn load_pnpm_catalogs(root: &Path) -> Result<Vec<CatalogEntry>> {
    match read_pnpm_workspace_file(root)? {
        Some(content) => parse_pnpm_catalogs(&content),
        None => Ok(Vec::new()),
    }
}

/// Extracts bun catalogs from a root manifest.
///
/// Top-level tables come first, then those nested under `workspaces`.
pub fn parse_bun_catalogs(manifest: &PackageManifest) -> Vec<CatalogEntry> {
    let mut tables = CatalogTables::default();
    tables.push_json_catalogs(manifest.catalog.as_ref(), manifest.catalogs.as_ref());

    if let Some(WorkspacesField::Config(config)) = &manifest.workspaces {
        tables.push_json_catalogs(config.catalog.as_ref(), config.catalogs.as_ref());
    }

    tables.entries
}

/// Loads bun catalogs from the root `package.json` under `root`.
pub fn load_bun_catalogs(root: &Path) -> Result<Vec<CatalogEntry>> {
    match read_manifest(&root.join(MANIFEST_FILE)) {
        Ok(manifest) => Ok(parse_bun_catalogs(&manifest)),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
