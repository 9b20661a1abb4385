//! Configuration loading, validation, and management for Strata.
//!
//! Loads configuration from `~/.strata/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The model-service credential is resolved separately by
//! [`AppConfig::resolve_api_key`], which also consults the workspace `.env`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables checked for the model-service credential, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "STRATA_API_KEY"];

/// The root configuration structure.
///
/// Maps directly to `~/.strata/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (lowest priority; env and workspace `.env` win)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model service settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Backoff settings for model calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Subprocess settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Workspace snapshot bounds
    #[serde(default)]
    pub context: ContextConfig,

    /// Per-action budgets
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("retry", &self.retry)
            .field("runner", &self.runner)
            .field("context", &self.context)
            .field("executor", &self.executor)
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used for chat turns
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Model used for `generateImage`; falls back to `name` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,

    /// Base URL of the generative-language REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_model_name() -> String {
    "gemini-3-pro-preview".into()
}
fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            image_model: None,
            api_url: default_api_url(),
        }
    }
}

impl ModelConfig {
    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `2^n * base_delay_ms` plus jitter
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each delay
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Byte cap of the combined stdout/stderr tail
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: usize,

    /// How long a long-running command is awaited before it is backgrounded
    #[serde(default = "default_long_running_grace_ms")]
    pub long_running_grace_ms: u64,

    /// Timeout for the PID lookup and kill commands used by `killPort`
    #[serde(default = "default_kill_port_timeout_ms")]
    pub kill_port_timeout_ms: u64,

    /// Extra substrings that mark a command as long-running
    #[serde(default)]
    pub extra_long_running_patterns: Vec<String>,

    /// Environment variables added to every spawned command
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_tail_bytes() -> usize {
    6000
}
fn default_long_running_grace_ms() -> u64 {
    15_000
}
fn default_kill_port_timeout_ms() -> u64 {
    5000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tail_bytes: default_tail_bytes(),
            long_running_grace_ms: default_long_running_grace_ms(),
            kill_port_timeout_ms: default_kill_port_timeout_ms(),
            extra_long_running_patterns: vec![],
            env: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn long_running_grace(&self) -> Duration {
        Duration::from_millis(self.long_running_grace_ms)
    }

    pub fn kill_port_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_port_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Hard cap on entries in the rendered tree
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Byte budget for each manifest read
    #[serde(default = "default_manifest_bytes")]
    pub manifest_bytes: usize,

    #[serde(default = "default_max_key_files")]
    pub max_key_files: usize,

    /// Byte budget per excerpted key file
    #[serde(default = "default_key_file_bytes")]
    pub key_file_bytes: usize,
}

fn default_ttl_ms() -> u64 {
    8000
}
fn default_max_entries() -> usize {
    250
}
fn default_max_depth() -> usize {
    4
}
fn default_manifest_bytes() -> usize {
    20_000
}
fn default_max_key_files() -> usize {
    8
}
fn default_key_file_bytes() -> usize {
    6000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            max_entries: default_max_entries(),
            max_depth: default_max_depth(),
            manifest_bytes: default_manifest_bytes(),
            max_key_files: default_max_key_files(),
            key_file_bytes: default_key_file_bytes(),
        }
    }
}

impl ContextConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Characters of a fetched body kept in the result
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,

    /// Bytes of a file returned by `readFile`
    #[serde(default = "default_read_max_bytes")]
    pub read_max_bytes: usize,

    /// Characters of command output kept when logging a result
    #[serde(default = "default_log_tail_chars")]
    pub log_tail_chars: usize,
}

fn default_fetch_max_chars() -> usize {
    8000
}
fn default_read_max_bytes() -> usize {
    20_000
}
fn default_log_tail_chars() -> usize {
    1500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fetch_max_chars: default_fetch_max_chars(),
            read_max_bytes: default_read_max_bytes(),
            log_tail_chars: default_log_tail_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Recent tool-log entries included in each prompt
    #[serde(default = "default_tool_log_window")]
    pub tool_log_window: usize,

    /// Persona active at session start (none means unrestricted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_persona: Option<String>,
}

fn default_tool_log_window() -> usize {
    25
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tool_log_window: default_tool_log_window(),
            default_persona: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.strata/config.toml).
    ///
    /// Environment overrides:
    /// - `STRATA_MODEL` replaces the chat model
    /// - `STRATA_PERSONA` replaces the default persona
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("STRATA_MODEL")
            && !model.trim().is_empty()
        {
            config.model.name = model;
        }

        if let Ok(persona) = std::env::var("STRATA_PERSONA")
            && !persona.trim().is_empty()
        {
            config.session.default_persona = Some(persona);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".strata")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("model.name must not be empty".into()));
        }
        if self.runner.tail_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "runner.tail_bytes must be > 0".into(),
            ));
        }
        if self.context.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_entries must be > 0".into(),
            ));
        }
        if self.retry.max_retries > 10 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be at most 10".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the model-service credential from the process environment,
    /// then the workspace `.env`, then the config file.
    pub fn resolve_api_key(&self, workspace: Option<&Path>) -> Result<String, ConfigError> {
        self.resolve_api_key_with(workspace, |name| std::env::var(name).ok())
    }

    /// Same as [`resolve_api_key`](Self::resolve_api_key) with an injectable
    /// environment lookup.
    pub fn resolve_api_key_with(
        &self,
        workspace: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        let non_empty = |v: String| (!v.trim().is_empty()).then(|| v.trim().to_string());

        if let Some(key) = API_KEY_ENV_VARS.iter().find_map(|name| lookup(name).and_then(non_empty)) {
            return Ok(key);
        }

        if let Some(root) = workspace {
            let env_path = root.join(".env");
            if let Ok(content) = std::fs::read_to_string(&env_path) {
                let vars = parse_env_file(&content);
                if let Some(key) = API_KEY_ENV_VARS
                    .iter()
                    .find_map(|name| vars.get(*name).cloned().and_then(non_empty))
                {
                    tracing::debug!("Using API key from {}", env_path.display());
                    return Ok(key);
                }
            }
        }

        self.api_key
            .clone()
            .and_then(non_empty)
            .ok_or(ConfigError::MissingCredential)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelConfig::default(),
            retry: RetryConfig::default(),
            runner: RunnerConfig::default(),
            context: ContextConfig::default(),
            executor: ExecutorConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Parse `.env`-style content: `KEY=value` lines, `#` comments and blank
/// lines skipped, one layer of matching surrounding quotes stripped.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(
        "No model-service API key found. Set GEMINI_API_KEY (or STRATA_API_KEY) in the environment or the workspace .env file."
    )]
    MissingCredential,
}
