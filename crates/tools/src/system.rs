//! Host status report for `getSystemStatus`.

use serde::Serialize;
use std::path::Path;

use crate::process::ProcessRegistry;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub platform: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
    pub cpus: usize,
    pub shell: String,
    pub cwd: String,
    pub workspace: Option<String>,
    pub active_process: bool,
    pub background_processes: Vec<String>,
}

impl SystemStatus {
    pub fn collect(workspace: Option<&Path>, registry: &ProcessRegistry) -> Self {
        let default_shell = if cfg!(target_os = "windows") {
            "cmd/powershell"
        } else {
            "sh"
        };
        Self {
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            shell: std::env::var("SHELL").unwrap_or_else(|_| default_shell.to_string()),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            workspace: workspace.map(|p| p.display().to_string()),
            active_process: registry.has_active(),
            background_processes: registry.background_commands(),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_platform_and_workspace() {
        let registry = ProcessRegistry::new();
        let status = SystemStatus::collect(Some(Path::new("/work")), &registry);
        assert_eq!(status.platform, std::env::consts::OS);
        assert!(status.cpus >= 1);
        assert!(!status.active_process);

        let json: serde_json::Value = serde_json::from_str(&status.to_pretty_json()).unwrap();
        assert_eq!(json["workspace"], "/work");
        assert!(json["backgroundProcesses"].as_array().unwrap().is_empty());
    }
}
