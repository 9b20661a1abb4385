//! Workspace memory: a small JSON key/value document under `.strata/`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use strata_core::ActionError;
use tracing::warn;

/// Location of the memory document, relative to the workspace root.
pub const MEMORY_FILE: &str = ".strata/memory.json";

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    path: PathBuf,
}

impl MemoryDocument {
    pub fn for_workspace(root: &Path) -> Self {
        Self {
            path: root.join(MEMORY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents. A missing or unreadable document is empty.
    pub async fn load(&self) -> Result<Map<String, Value>, ActionError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ActionError::io(self.path.display().to_string(), e)),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Memory document is not a JSON object; treating as empty");
                Ok(Map::new())
            }
        }
    }

    /// Set `key` to `value` and persist.
    pub async fn write(&self, key: &str, value: Value) -> Result<(), ActionError> {
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&Value::Object(map))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ActionError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ActionError::io(self.path.display().to_string(), e))
    }

    /// Delete the document. Clearing an absent document succeeds.
    pub async fn clear(&self) -> Result<(), ActionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ActionError::io(self.path.display().to_string(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::for_workspace(dir.path());
        assert!(doc.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let doc = MemoryDocument::for_workspace(dir.path());

        doc.write("stack", json!("vite+react")).await.unwrap();
        doc.write("port", json!(5173)).await.unwrap();
        let map = doc.load().await.unwrap();
        assert_eq!(map["stack"], "vite+react");
        assert_eq!(map["port"], 5173);
        assert!(dir.path().join(".strata/memory.json").exists());

        doc.clear().await.unwrap();
        assert!(doc.load().await.unwrap().is_empty());
        doc.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".strata")).unwrap();
        std::fs::write(dir.path().join(MEMORY_FILE), "[1, 2").unwrap();
        let doc = MemoryDocument::for_workspace(dir.path());
        assert!(doc.load().await.unwrap().is_empty());
    }
}
