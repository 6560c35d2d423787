//! Error types for workspace scanning and manifest analysis.
//!
//! Errors never cross the protocol boundary: registry refreshes, the
//! validator and the LSP handlers turn them into log lines and empty results.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspacesError {
    #[error("I/O error while {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {file_type}: {source}")]
    Json {
        file_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse {file_type}: {message}")]
    Yaml { file_type: String, message: String },

    #[error("Invalid workspace glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid file URI: {0}")]
    InvalidUri(String),

    #[error("{} is too large: {size} bytes (max: {limit} bytes)", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Timed out after {timeout_ms}ms while {operation} {}", path.display())]
    Timeout {
        operation: &'static str,
        path: PathBuf,
        timeout_ms: u64,
    },
}

impl WorkspacesError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Returns true when the error only means "the file is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, WorkspacesError>;
