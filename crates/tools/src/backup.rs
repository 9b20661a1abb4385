//! Workspace snapshots under `.strata/backups/`.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use strata_core::ActionError;

/// Top-level entries never copied into a snapshot.
pub const BACKUP_EXCLUDES: &[&str] = &[".strata", ".git", "node_modules", ".vscode", "dist", "build"];

/// A finished snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    /// Folder name under `.strata/backups/`
    pub name: String,
    pub path: PathBuf,
    /// Top-level entries copied
    pub items: usize,
}

impl Backup {
    pub fn summary(&self) -> String {
        format!(
            "Snapshot created at .strata/backups/{} ({} items)",
            self.name, self.items
        )
    }
}

/// ISO-8601 timestamp with `:` and `.` replaced so it is a valid folder name.
pub fn backup_name(now: DateTime<Utc>, label: Option<&str>) -> String {
    let stamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string();
    match label.map(sanitize_label).filter(|l| !l.is_empty()) {
        Some(label) => format!("{stamp}_{label}"),
        None => stamp,
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '.') || c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Copy every top-level workspace entry except [`BACKUP_EXCLUDES`] into a
/// new timestamped snapshot folder.
pub async fn create_backup(root: &Path, label: Option<&str>) -> Result<Backup, ActionError> {
    let name = backup_name(Utc::now(), label);
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || copy_snapshot(&root, name))
        .await
        .map_err(|e| ActionError::io("backup", std::io::Error::other(e.to_string())))?
}

fn copy_snapshot(root: &Path, name: String) -> Result<Backup, ActionError> {
    let dest = root.join(".strata").join("backups").join(&name);
    let io = |p: &Path| {
        let shown = p.display().to_string();
        move |e| ActionError::io(shown, e)
    };

    std::fs::create_dir_all(&dest).map_err(io(&dest))?;

    let mut items = 0;
    for entry in std::fs::read_dir(root).map_err(io(root))? {
        let entry = entry.map_err(io(root))?;
        let file_name = entry.file_name();
        if BACKUP_EXCLUDES.iter().any(|ex| file_name == *ex) {
            continue;
        }
        let src = entry.path();
        copy_recursive(&src, &dest.join(&file_name)).map_err(io(&src))?;
        items += 1;
    }

    Ok(Backup {
        name,
        path: dest,
        items,
    })
}

/// Recursive copy. Symlinked directories are not followed.
fn copy_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else if meta.is_file() || std::fs::metadata(src).is_ok_and(|m| m.is_file()) {
        std::fs::copy(src, dest)?;
    }
    Ok(())
}
