//! Typed view of the `package.json` fields the workspace engine reads.

use crate::error::{Result, WorkspacesError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

pub const MANIFEST_FILE: &str = "package.json";

/// Parsed package descriptor.
///
/// Only the fields needed for workspace discovery, completion details and
/// bun catalogs are modelled; everything else in the file is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub workspaces: Option<WorkspacesField>,
    pub catalog: Option<Map<String, Value>>,
    pub catalogs: Option<Map<String, Value>>,
}

/// The `workspaces` field: either a list of globs (npm, yarn classic, bun) or
/// an object with `packages` plus, for bun, catalog tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WorkspacesField {
    Globs(Vec<String>),
    Config(WorkspacesObject),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkspacesObject {
    #[serde(default)]
    pub packages: Vec<String>,
    pub catalog: Option<Map<String, Value>>,
    pub catalogs: Option<Map<String, Value>>,
}

impl PackageManifest {
    /// Parses manifest text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| WorkspacesError::Json {
            file_type: MANIFEST_FILE.into(),
            source,
        })
    }

    /// Workspace globs declared by this manifest, if it is a workspace root.
    pub fn workspace_globs(&self) -> &[String] {
        match &self.workspaces {
            Some(WorkspacesField::Globs(globs)) => globs,
            Some(WorkspacesField::Config(config)) => &config.packages,
            None => &[],
        }
    }
}

/// Reads and parses `package.json` at `path`.
pub fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WorkspacesError::io("reading", path, e))?;

    serde_json::from_str(&content).map_err(|source| WorkspacesError::Json {
        file_type: path.display().to_string(),
        source,
    })
}
