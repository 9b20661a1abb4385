//! Filesystem effects: create, write, append, delete, read, list.
//!
//! Every function takes an already-resolved path and maps I/O failures to
//! [`ActionError::Io`] tagged with that path.

use std::path::Path;
use strata_core::ActionError;
use tokio::io::AsyncWriteExt;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ActionError + '_ {
    move |e| ActionError::io(path.display().to_string(), e)
}

async fn ensure_parent(path: &Path) -> Result<(), ActionError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }
    Ok(())
}

/// `mkdir -p`.
pub async fn create_directory(path: &Path) -> Result<(), ActionError> {
    tokio::fs::create_dir_all(path).await.map_err(io_err(path))
}

/// Create or truncate `path`, creating parent directories as needed.
pub async fn write_file(path: &Path, content: &str) -> Result<(), ActionError> {
    ensure_parent(path).await?;
    tokio::fs::write(path, content).await.map_err(io_err(path))
}

/// Append to `path`, creating it (and its parents) if absent.
pub async fn append_file(path: &Path, content: &str) -> Result<(), ActionError> {
    ensure_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err(path))?;
    file.write_all(content.as_bytes()).await.map_err(io_err(path))?;
    file.flush().await.map_err(io_err(path))
}

/// Delete a file, or a directory recursively.
pub async fn delete_path(path: &Path) -> Result<(), ActionError> {
    let meta = tokio::fs::symlink_metadata(path).await.map_err(io_err(path))?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await.map_err(io_err(path))
    } else {
        tokio::fs::remove_file(path).await.map_err(io_err(path))
    }
}

/// Read at most `max_bytes` of a text file. Returns the text and whether it
/// was cut short. Invalid UTF-8 is replaced rather than rejected.
pub async fn read_file(path: &Path, max_bytes: usize) -> Result<(String, bool), ActionError> {
    let bytes = tokio::fs::read(path).await.map_err(io_err(path))?;
    let truncated = bytes.len() > max_bytes;
    let slice = if truncated { &bytes[..max_bytes] } else { &bytes[..] };
    Ok((String::from_utf8_lossy(slice).into_owned(), truncated))
}

/// Sorted directory listing; directories carry a trailing `/`.
pub async fn list_dir(path: &Path) -> Result<Vec<String>, ActionError> {
    let mut dir = tokio::fs::read_dir(path).await.map_err(io_err(path))?;
    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(io_err(path))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        names.push(if is_dir { format!("{name}/") } else { name });
    }
    names.sort();
    Ok(names)
}

/// True if `path` exists and is a regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}
