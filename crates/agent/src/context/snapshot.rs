//! Workspace snapshot: a bounded textual view of the project for prompts.
//!
//! The tree is walked breadth-first so the entry cap favors shallow
//! entries, then rendered as an indented tree. Manifests (`package.json`,
//! `Cargo.toml`) at the root and in immediate subdirectories are summarized,
//! and a few key files per project are excerpted.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use strata_config::ContextConfig;

/// Directory names never descended into or listed.
pub const IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    "out",
    "coverage",
    ".turbo",
    ".cache",
    ".vscode",
    ".npm",
    ".strata",
    "target",
];

const NODE_KEY_FILES: &[&str] = &[
    "vite.config.js",
    "vite.config.ts",
    "next.config.js",
    "next.config.mjs",
    "tailwind.config.js",
    "tailwind.config.cjs",
    "tailwind.config.ts",
    "postcss.config.js",
    "postcss.config.cjs",
    "tsconfig.json",
    "jsconfig.json",
    "src/main.jsx",
    "src/main.tsx",
    "src/index.jsx",
    "src/index.tsx",
    "src/App.jsx",
    "src/App.tsx",
    "app/page.jsx",
    "app/page.tsx",
    "README.md",
];

const RUST_KEY_FILES: &[&str] = &["src/main.rs", "src/lib.rs", "build.rs", "README.md"];

/// Items listed per manifest field before eliding the rest.
const SUMMARY_LIST_CAP: usize = 40;

/// Raw-text fallback for a manifest that doesn't parse.
const UNPARSED_MANIFEST_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
    Cargo,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
            Self::Cargo => "cargo",
        }
    }

    /// Lockfile precedence: pnpm, yarn, bun, then npm.
    fn detect_node(root: &Path) -> Self {
        [
            ("pnpm-lock.yaml", Self::Pnpm),
            ("yarn.lock", Self::Yarn),
            ("bun.lockb", Self::Bun),
            ("package-lock.json", Self::Npm),
        ]
        .into_iter()
        .find(|(lockfile, _)| root.join(lockfile).is_file())
        .map_or(Self::Npm, |(_, pm)| pm)
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured hints derived while building the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSignals {
    pub package_manager: Option<PackageManager>,
    pub has_projects: bool,
    /// A Node project exists without its `node_modules`
    pub needs_install: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkspaceSnapshot {
    pub text: String,
    pub signals: WorkspaceSignals,
    /// Rendered tree lines, one per selected entry
    #[serde(skip)]
    pub tree: Vec<String>,
}

impl WorkspaceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone)]
struct TreeEntry {
    rel: PathBuf,
    name: String,
    is_dir: bool,
    depth: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PackageSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scripts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_dependencies: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CrateSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<String>,
}

struct Project {
    manifest: String,
    status: Option<String>,
    needs_install: bool,
    summary: String,
    key_files: Vec<(String, String)>,
}

/// Builds snapshots of one workspace root.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    root: PathBuf,
    config: ContextConfig,
}

impl SnapshotBuilder {
    pub fn new(root: impl Into<PathBuf>, config: ContextConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the workspace and render the snapshot. Blocking; callers on a
    /// runtime should go through `spawn_blocking`.
    pub fn build(&self) -> WorkspaceSnapshot {
        let entries = self.walk();
        let tree = render_tree(&entries);

        let project_dirs = self.project_dirs();
        let node: Vec<Project> = project_dirs
            .iter()
            .filter_map(|dir| self.node_project(dir))
            .collect();
        let rust: Vec<Project> = project_dirs
            .iter()
            .filter_map(|dir| self.rust_project(dir))
            .collect();

        let mut signals = WorkspaceSignals {
            has_projects: !node.is_empty() || !rust.is_empty(),
            ..Default::default()
        };

        let mut sections = vec![
            "Workspace context:".to_string(),
            format!("Workspace root: {}", self.root.display()),
            "File tree (truncated):".to_string(),
            if tree.is_empty() {
                "(empty)".to_string()
            } else {
                tree.join("\n")
            },
        ];

        if !node.is_empty() {
            let pm = PackageManager::detect_node(&self.root);
            signals.package_manager = Some(pm);
            signals.needs_install = node.iter().any(|p| p.needs_install);
            sections.push("Detected Node project(s):".into());
            sections.push(format!("Package manager hint: {pm}"));
            push_projects(&mut sections, &node, "package.json");
        }

        if !rust.is_empty() {
            signals.package_manager.get_or_insert(PackageManager::Cargo);
            sections.push("Detected Rust project(s):".into());
            push_projects(&mut sections, &rust, "Cargo.toml");
        }

        WorkspaceSnapshot {
            text: sections.join("\n") + "\n",
            signals,
            tree,
        }
    }

    fn walk(&self) -> Vec<TreeEntry> {
        let max_entries = self.config.max_entries;
        let mut selected = Vec::new();
        let mut queue = VecDeque::from([(PathBuf::new(), 0usize)]);

        while let Some((rel, depth)) = queue.pop_front() {
            if selected.len() >= max_entries {
                break;
            }
            for (name, is_dir) in list_visible(&self.root.join(&rel)) {
                if selected.len() >= max_entries {
                    break;
                }
                let child = rel.join(&name);
                if is_dir && depth < self.config.max_depth {
                    queue.push_back((child.clone(), depth + 1));
                }
                selected.push(TreeEntry {
                    rel: child,
                    name,
                    is_dir,
                    depth,
                });
            }
        }
        selected
    }

    /// The root plus each visible immediate subdirectory.
    fn project_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(self.root.clone())
            .chain(
                list_visible(&self.root)
                    .into_iter()
                    .filter(|(_, is_dir)| *is_dir)
                    .map(|(name, _)| self.root.join(name)),
            )
            .collect()
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn node_project(&self, dir: &Path) -> Option<Project> {
        let manifest = dir.join("package.json");
        if !manifest.is_file() {
            return None;
        }
        let text = read_truncated(&manifest, self.config.manifest_bytes).unwrap_or_default();
        let summary = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(pkg) => summarize_package_json(&pkg),
            Err(_) => text.chars().take(UNPARSED_MANIFEST_CHARS).collect(),
        };
        let has_modules = dir.join("node_modules").is_dir();

        Some(Project {
            manifest: self.relative(&manifest),
            status: Some(format!(
                "node_modules: {}",
                if has_modules { "present" } else { "missing" }
            )),
            needs_install: !has_modules,
            summary,
            key_files: self.key_files(dir, NODE_KEY_FILES),
        })
    }

    fn rust_project(&self, dir: &Path) -> Option<Project> {
        let manifest = dir.join("Cargo.toml");
        if !manifest.is_file() {
            return None;
        }
        let text = read_truncated(&manifest, self.config.manifest_bytes).unwrap_or_default();
        let summary = match text.parse::<toml::Table>() {
            Ok(table) => summarize_cargo_toml(&table),
            Err(_) => text.chars().take(UNPARSED_MANIFEST_CHARS).collect(),
        };

        Some(Project {
            manifest: self.relative(&manifest),
            status: None,
            needs_install: false,
            summary,
            key_files: self.key_files(dir, RUST_KEY_FILES),
        })
    }

    fn key_files(&self, dir: &Path, candidates: &[&str]) -> Vec<(String, String)> {
        candidates
            .iter()
            .map(|rel| dir.join(rel))
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let contents = read_truncated(&path, self.config.key_file_bytes)?;
                (!contents.is_empty()).then(|| (self.relative(&path), contents))
            })
            .take(self.config.max_key_files)
            .collect()
    }
}

fn push_projects(sections: &mut Vec<String>, projects: &[Project], manifest_name: &str) {
    for project in projects {
        match &project.status {
            Some(status) => sections.push(format!(
                "- {manifest_name}: {} | {status}",
                project.manifest
            )),
            None => sections.push(format!("- {manifest_name}: {}", project.manifest)),
        }
        if !project.summary.is_empty() {
            sections.push(format!("{manifest_name} summary:"));
            sections.push(project.summary.clone());
        }
        if !project.key_files.is_empty() {
            sections.push("Key file excerpts (truncated):".into());
            for (path, contents) in &project.key_files {
                sections.push(format!("--- file: {path} ---"));
                sections.push(contents.clone());
            }
        }
    }
}

/// Sorted `(name, is_dir)` pairs of a directory, ignored directories removed.
/// Unreadable directories list as empty.
fn list_visible(dir: &Path) -> Vec<(String, bool)> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut entries: Vec<(String, bool)> = read
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let is_dir = entry.file_type().ok()?.is_dir();
            Some((name, is_dir))
        })
        .filter(|(name, is_dir)| !(*is_dir && IGNORE_DIRS.contains(&name.as_str())))
        .collect();
    entries.sort();
    entries
}

/// Render BFS-selected entries as an indented tree. Every selected entry's
/// parent was selected first, so each entry yields exactly one line.
fn render_tree(entries: &[TreeEntry]) -> Vec<String> {
    let mut children: BTreeMap<PathBuf, Vec<&TreeEntry>> = BTreeMap::new();
    for entry in entries {
        let parent = entry.rel.parent().map(Path::to_path_buf).unwrap_or_default();
        children.entry(parent).or_default().push(entry);
    }

    fn render(
        dir: &Path,
        children: &BTreeMap<PathBuf, Vec<&TreeEntry>>,
        lines: &mut Vec<String>,
    ) {
        let Some(kids) = children.get(dir) else {
            return;
        };
        for entry in kids {
            lines.push(format!(
                "{}{}{}",
                "  ".repeat(entry.depth),
                entry.name,
                if entry.is_dir { "/" } else { "" }
            ));
            if entry.is_dir {
                render(&entry.rel, children, lines);
            }
        }
    }

    let mut lines = Vec::with_capacity(entries.len());
    render(Path::new(""), &children, &mut lines);
    lines
}

fn read_truncated(path: &Path, max_bytes: usize) -> Option<String> {
    let mut buf = Vec::new();
    File::open(path)
        .ok()?
        .take(max_bytes as u64)
        .read_to_end(&mut buf)
        .ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn capped_list<'a>(items: impl Iterator<Item = &'a String>) -> Option<String> {
    let items: Vec<&str> = items.map(String::as_str).collect();
    if items.is_empty() {
        return None;
    }
    let mut text = items
        .iter()
        .take(SUMMARY_LIST_CAP)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > SUMMARY_LIST_CAP {
        text.push_str(", ...");
    }
    Some(text)
}

fn summarize_package_json(pkg: &serde_json::Value) -> String {
    let keys = |field: &str| {
        pkg.get(field)
            .and_then(serde_json::Value::as_object)
            .and_then(|obj| capped_list(obj.keys()))
    };
    let summary = PackageSummary {
        name: pkg
            .get("name")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        private: pkg
            .get("private")
            .and_then(serde_json::Value::as_bool)
            .filter(|p| *p),
        scripts: keys("scripts"),
        dependencies: keys("dependencies"),
        dev_dependencies: keys("devDependencies"),
    };
    serde_json::to_string_pretty(&summary).unwrap_or_default()
}

fn summarize_cargo_toml(table: &toml::Table) -> String {
    let keys = |value: Option<&toml::Value>| {
        value
            .and_then(toml::Value::as_table)
            .and_then(|t| capped_list(t.keys()))
    };
    let workspace = table.get("workspace");
    let members = workspace
        .and_then(|ws| ws.get("members"))
        .and_then(toml::Value::as_array)
        .map(|members| {
            members
                .iter()
                .filter_map(toml::Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .and_then(|members| capped_list(members.iter()));

    let summary = CrateSummary {
        name: table
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(toml::Value::as_str)
            .map(str::to_string),
        members,
        dependencies: keys(table.get("dependencies"))
            .or_else(|| keys(workspace.and_then(|ws| ws.get("dependencies")))),
    };
    serde_json::to_string_pretty(&summary).unwrap_or_default()
}
