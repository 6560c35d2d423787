pub mod completion;
pub mod definition;
pub mod diagnostics;

use tower_lsp_server::ls_types::Uri;
use workspaces_core::is_manifest;

/// Whether `uri` points at a `package.json` on disk.
pub fn is_manifest_uri(uri: &Uri) -> bool {
    uri.to_file_path().is_some_and(|path| is_manifest(&path))
}
