//! Workspace state engine for npm-workspaces-lsp.
//!
//! Detects the package manager of a JavaScript monorepo, discovers its member
//! packages and catalogs, and answers the editor-facing questions the server
//! asks about a `package.json`: what can be completed, where a dependency is
//! defined, and which declared dependencies are not installed.

pub mod analyzer;
pub mod catalog;
pub mod completion;
pub mod definition;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod package_manager;
pub mod position;
pub mod registry;
pub mod validation;
pub mod watch;

pub use analyzer::{DependencyField, ManifestAnalyzer, ManifestDependencySpan, RegexManifestAnalyzer};
pub use catalog::CatalogEntry;
pub use completion::{completions, resolve_completion};
pub use definition::resolve_definition;
pub use discovery::{WorkspacePackage, discover_packages, find_workspace_root};
pub use error::{Result, WorkspacesError};
pub use manifest::{MANIFEST_FILE, PackageManifest};
pub use package_manager::{PackageManagerKind, PackageManagerSupport, detect};
pub use registry::{RegistrySnapshot, WorkspaceRegistry, scan_workspace};
pub use validation::{DIAGNOSTIC_SOURCE, ValidationOptions, is_manifest, validate_manifest};
pub use watch::{RegistryRefresher, WorkspaceEvent, watched_file_names};
