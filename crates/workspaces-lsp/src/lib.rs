pub mod config;
pub mod document;
pub mod handlers;
pub mod server;

pub use config::{DiagnosticsConfig, WorkspacesConfig};
pub use server::Backend;
pub use workspaces_core::{Result, WorkspacesError};
