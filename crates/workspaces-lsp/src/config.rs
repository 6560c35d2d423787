//! Server configuration, read from `initializationOptions`.

use serde::Deserialize;
use std::time::Duration;
use tower_lsp_server::ls_types::DiagnosticSeverity;
use workspaces_core::ValidationOptions;

/// Top-level configuration. Every field is optional in the client payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspacesConfig {
    pub diagnostics: DiagnosticsConfig,
    /// Upper bound for listing one `node_modules` directory.
    pub scan_timeout_ms: u64,
    /// Register file watchers for lockfiles and manifests.
    pub watch_lockfile: bool,
}

impl Default for WorkspacesConfig {
    fn default() -> Self {
        Self {
            diagnostics: DiagnosticsConfig::default(),
            scan_timeout_ms: 5_000,
            watch_lockfile: true,
        }
    }
}

impl WorkspacesConfig {
    /// Parses `initializationOptions`, falling back to defaults when the
    /// payload is absent or malformed.
    pub fn from_init_options(options: Option<serde_json::Value>) -> Self {
        let Some(options) = options else {
            return Self::default();
        };

        match serde_json::from_value(options) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid initialization options, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            severity: self.diagnostics.severity,
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub severity: DiagnosticSeverity,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: DiagnosticSeverity::WARNING,
        }
    }
}
