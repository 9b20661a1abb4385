//! Action executor: one call per action, always producing a result.
//!
//! Each raw action is lifted into the closed [`Action`] enum and matched
//! exhaustively. Any local failure becomes a `failed` result; a batch is
//! never aborted because one action failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use strata_config::{AppConfig, ExecutorConfig};
use strata_core::{
    Action, ActionError, ActionResult, ActionStatus, MemoryOperation, ModelClient, OutputEvent,
    OutputStream, ProviderError, RawAction,
};
use strata_security::resolve_workspace_path;
use tracing::{debug, warn};

use crate::backup::create_backup;
use crate::fetch::fetch_text;
use crate::fs_ops;
use crate::image::generate_image;
use crate::kill::{kill_port, killed_background_message};
use crate::memory_doc::MemoryDocument;
use crate::process::{ProcessRegistry, ProcessRunner, RunOutcome};
use crate::system::SystemStatus;
use crate::text::tail_chars;

/// Dispatches actions against one workspace.
pub struct ActionExecutor {
    workspace: Option<PathBuf>,
    runner: Arc<ProcessRunner>,
    http: reqwest::Client,
    image_client: Option<Arc<dyn ModelClient>>,
    image_model: String,
    limits: ExecutorConfig,
    kill_port_timeout: Duration,
}

impl ActionExecutor {
    /// Build an executor with a fresh process registry publishing to `output`.
    pub fn new(config: &AppConfig, workspace: Option<PathBuf>, output: OutputStream) -> Self {
        let runner = ProcessRunner::new(&config.runner, Arc::new(ProcessRegistry::new()), output);
        Self::with_runner(config, workspace, Arc::new(runner))
    }

    pub fn with_runner(
        config: &AppConfig,
        workspace: Option<PathBuf>,
        runner: Arc<ProcessRunner>,
    ) -> Self {
        Self {
            workspace,
            runner,
            http: reqwest::Client::new(),
            image_client: None,
            image_model: config.model.image_model().to_string(),
            limits: config.executor.clone(),
            kill_port_timeout: config.runner.kill_port_timeout(),
        }
    }

    /// Client used by `generateImage`. Without one, image actions fail.
    pub fn with_image_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.image_client = Some(client);
        self
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn runner(&self) -> &Arc<ProcessRunner> {
        &self.runner
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        self.runner.registry()
    }

    fn output(&self) -> &OutputStream {
        self.runner.output()
    }

    /// Execute each action in order.
    pub async fn execute_all(&self, actions: &[RawAction]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            results.push(self.execute(action).await);
        }
        results
    }

    /// Execute one action. Never fails: errors become `failed` results, and
    /// a missing primary field on a skippable kind becomes `skipped`.
    pub async fn execute(&self, raw: &RawAction) -> ActionResult {
        let action = match Action::try_from(raw) {
            Ok(action) => action,
            Err(e @ ActionError::MissingField { .. })
                if raw.kind().is_some_and(|k| k.skips_when_incomplete()) =>
            {
                debug!(action = %raw.type_name, "Skipping incomplete action: {e}");
                return ActionResult::skipped(raw.clone(), e.to_string());
            }
            Err(e) => return self.failure(raw, e),
        };

        debug!(action = %raw.canonical_type(), "Executing action");
        match self.dispatch(raw, action).await {
            Ok(result) => result,
            Err(e) => self.failure(raw, e),
        }
    }

    fn failure(&self, raw: &RawAction, error: ActionError) -> ActionResult {
        warn!(action = %raw.type_name, error = %error, "Action failed");
        ActionResult::failed(raw.clone(), error.to_string())
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ActionError> {
        resolve_workspace_path(self.workspace(), path)
    }

    fn root(&self) -> Result<&Path, ActionError> {
        self.workspace().ok_or(ActionError::NoWorkspace)
    }

    async fn dispatch(&self, raw: &RawAction, action: Action) -> Result<ActionResult, ActionError> {
        let ok = |message: String| ActionResult::success(raw.clone(), message);
        let ok_with_output = |message: String, output: String| {
            let mut result = ActionResult::success(raw.clone(), message);
            result.output_tail = (!output.is_empty()).then_some(output);
            result
        };

        Ok(match action {
            Action::CreateDirectory { path } => {
                fs_ops::create_directory(&self.resolve(&path)?).await?;
                ok(format!("Created directory {path}"))
            }
            Action::CreateOrOverwriteFile { path, content } => {
                fs_ops::write_file(&self.resolve(&path)?, &content).await?;
                ok(format!("Wrote {} bytes to {path}", content.len()))
            }
            Action::AppendToFile { path, content } => {
                fs_ops::append_file(&self.resolve(&path)?, &content).await?;
                ok(format!("Appended {} bytes to {path}", content.len()))
            }
            Action::DeletePath { path } => {
                fs_ops::delete_path(&self.resolve(&path)?).await?;
                ok(format!("Deleted {path}"))
            }
            Action::OpenFile { path } => {
                let resolved = self.resolve(&path)?;
                if !fs_ops::is_file(&resolved).await {
                    return Err(ActionError::io(
                        path,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                    ));
                }
                self.output().publish(OutputEvent::OpenFile {
                    path: resolved.display().to_string(),
                });
                ok(format!("Opened {path}"))
            }
            Action::ReadFile { path } => {
                let (content, truncated) =
                    fs_ops::read_file(&self.resolve(&path)?, self.limits.read_max_bytes).await?;
                let note = if truncated { " (truncated)" } else { "" };
                ok_with_output(format!("Read {path}{note}"), content)
            }
            Action::ListFiles { path } => {
                let entries = fs_ops::list_dir(&self.resolve(&path)?).await?;
                ok_with_output(format!("{} entries in {path}", entries.len()), entries.join("\n"))
            }
            Action::FetchUrl { url } => {
                let body = fetch_text(&self.http, &url, self.limits.fetch_max_chars).await?;
                ok_with_output(format!("Fetched {url}"), body)
            }
            Action::KillPort { port } => {
                self.output()
                    .notice(format!("[Killing processes on port {port}]"));
                let killed = kill_port(port, self.kill_port_timeout).await?;
                let msg = if killed.is_empty() {
                    format!("Port {port} cleared (no listening process)")
                } else {
                    format!("Killed {} process(es) on port {port}", killed.len())
                };
                self.output().notice(format!("[{msg}]"));
                ok(msg)
            }
            Action::KillBackgroundProcesses => {
                let killed = self.registry().kill_all();
                let msg = killed_background_message(killed);
                self.output().notice(format!("[{msg}]"));
                ok_with_output(msg.clone(), msg)
            }
            Action::RunTerminalCommand { command, cwd } => {
                let cwd = match cwd {
                    Some(dir) => Some(self.resolve(&dir)?),
                    None => self.workspace.clone(),
                };
                let outcome = self.runner.run_command(&command, cwd.as_deref()).await;
                self.command_result(raw, &command, outcome)
            }
            Action::GetSystemStatus => {
                let status = SystemStatus::collect(self.workspace(), self.registry());
                ok_with_output("System status collected".into(), status.to_pretty_json())
            }
            Action::ManageMemory {
                operation,
                key,
                value,
            } => {
                let doc = MemoryDocument::for_workspace(self.root()?);
                match operation {
                    MemoryOperation::Write => {
                        let missing = |field| ActionError::MissingField {
                            action: "manageMemory".into(),
                            field,
                        };
                        let key = key.ok_or_else(|| missing("key"))?;
                        let value = value.ok_or_else(|| missing("value"))?;
                        doc.write(&key, value).await?;
                        ok(format!("Wrote key: {key}"))
                    }
                    MemoryOperation::Clear => {
                        doc.clear().await?;
                        ok("Memory cleared".into())
                    }
                    MemoryOperation::Read => {
                        let map = doc.load().await?;
                        let json = serde_json::to_string_pretty(&map)?;
                        ok_with_output(format!("{} key(s) in memory", map.len()), json)
                    }
                }
            }
            Action::CreateBackup { label } => {
                let backup = create_backup(self.root()?, label.as_deref()).await?;
                ok(backup.summary())
            }
            Action::GenerateImage {
                prompt,
                output_path,
            } => {
                let client = self.image_client.as_deref().ok_or_else(|| {
                    ProviderError::NotConfigured("no model client for image generation".into())
                })?;
                let image = generate_image(
                    client,
                    &self.image_model,
                    &prompt,
                    output_path.as_deref(),
                    self.workspace(),
                )
                .await?;
                let msg = image.summary(self.workspace());
                self.output().notice(msg.clone());
                ok(msg)
            }
            Action::Unknown { type_name } => return Err(ActionError::Unsupported(type_name)),
        })
    }

    /// `exit=N` / `running` result with a bounded output tail.
    fn command_result(&self, raw: &RawAction, command: &str, outcome: RunOutcome) -> ActionResult {
        let tail = tail_chars(outcome.output_tail.trim(), self.limits.log_tail_chars).to_string();

        let (status, message) = if outcome.still_running {
            (ActionStatus::Running, "running".to_string())
        } else if outcome.succeeded() {
            (ActionStatus::Success, "exit=0".to_string())
        } else {
            let code = outcome.exit_code.unwrap_or(-1);
            let mut msg = format!("exit={code}");
            if outcome.command != command {
                msg.push_str(&format!(" (failed at: {})", outcome.command));
            }
            if let Some(detail) = &outcome.message {
                msg.push_str(&format!(": {detail}"));
            }
            warn!(command, exit_code = code, "Command failed");
            (ActionStatus::Failed, msg)
        };

        ActionResult {
            action: raw.clone(),
            status,
            exit_code: outcome.exit_code,
            output_tail: (!tail.is_empty()).then_some(tail),
            message: Some(message),
        }
    }
}
