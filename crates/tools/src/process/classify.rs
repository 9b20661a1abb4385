//! Long-running command classification.
//!
//! A command is long-running (a dev server, a watcher) when its lowercased
//! text contains any configured pattern. Such commands are awaited only for
//! a grace period and then left running in the background.

/// Built-in long-running patterns.
pub const DEFAULT_LONG_RUNNING_PATTERNS: &[&str] = &[
    "npm run dev",
    "pnpm dev",
    "yarn dev",
    "bun dev",
    "npm start",
    "pnpm start",
    "yarn start",
    "bun start",
    "vite",
    "next dev",
    "node server",
    "nodemon",
    "watch",
];

/// Substring-pattern predicate over command text.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    patterns: Vec<String>,
}

impl CommandClassifier {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Built-in patterns plus `extra`.
    pub fn with_extra(extra: &[String]) -> Self {
        Self::new(
            DEFAULT_LONG_RUNNING_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .chain(extra.iter().cloned()),
        )
    }

    pub fn is_long_running(&self, command: &str) -> bool {
        let lower = command.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::with_extra(&[])
    }
}
