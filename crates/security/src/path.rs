//! Path resolution: map action paths onto the workspace root.
//!
//! Absolute paths are honored as-is. Relative paths are joined onto the
//! workspace root, which must be present. No sandboxing is applied.

use std::path::{Path, PathBuf};
use strata_core::ActionError;

/// Resolve `path` against an optional workspace root.
pub fn resolve_workspace_path(root: Option<&Path>, path: &str) -> Result<PathBuf, ActionError> {
    let trimmed = path.trim();
    if is_absolute(trimmed) {
        return Ok(PathBuf::from(trimmed));
    }
    let root = root.ok_or(ActionError::NoWorkspace)?;
    Ok(root.join(trimmed))
}

/// `Path::is_absolute` plus Windows drive (`C:\`, `C:/`) and UNC forms on
/// every platform, since the model may emit either style.
fn is_absolute(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with("\\\\") {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}
