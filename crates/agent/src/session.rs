//! Session orchestrator: one conversation against one workspace.
//!
//! A turn is: snapshot the workspace, compose the prompt, call the model
//! (through the retrier), extract the tool block, filter it by persona, and
//! optionally execute what survived. Every result lands in the tool log that
//! grounds the next prompt.

use std::collections::HashSet;
use std::sync::Arc;

use strata_config::AppConfig;
use strata_core::{
    ActionKind, ActionResult, ActionStatus, GenerateRequest, ModelClient, ProviderError, RawAction,
    ToolLog,
};
use strata_providers::{RetryPolicy, RetryingClient};
use strata_security::{AgentProfile, PersonaRegistry, RoleAccessFilter};
use strata_tools::{ActionExecutor, extract};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::ContextCache;
use crate::prompt::{self, CONTINUE_PROMPT, PromptInput, Turn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What the model said, split into prose and vetted actions.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub display_text: String,
    /// Actions the active persona may run, in model order
    pub actions: Vec<RawAction>,
    /// Refused actions, already recorded as failed results
    pub blocked: Vec<ActionResult>,
}

#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub reply: Reply,
    /// Empty unless the turn applied its actions
    pub results: Vec<ActionResult>,
}

pub struct Session {
    model: Arc<dyn ModelClient>,
    model_name: String,
    executor: ActionExecutor,
    filter: RoleAccessFilter,
    context: ContextCache,
    persona: Option<String>,
    history: Vec<Turn>,
    tool_log: ToolLog,
    tool_log_window: usize,
}

impl Session {
    /// A session calling `model` as-is. Wrap it in a retrier first, or use
    /// [`Session::with_retry`].
    pub fn new(config: &AppConfig, model: Arc<dyn ModelClient>, executor: ActionExecutor) -> Self {
        Self {
            model,
            model_name: config.model.name.clone(),
            context: ContextCache::new(executor.workspace(), &config.context),
            executor,
            filter: RoleAccessFilter::default(),
            persona: config.session.default_persona.clone(),
            history: Vec::new(),
            tool_log: ToolLog::new(),
            tool_log_window: config.session.tool_log_window,
        }
    }

    /// A session whose model calls go through the configured retry policy.
    pub fn with_retry<C: ModelClient + 'static>(
        config: &AppConfig,
        client: C,
        executor: ActionExecutor,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        Self::new(config, Arc::new(RetryingClient::new(client, policy)), executor)
    }

    pub fn with_personas(mut self, personas: PersonaRegistry) -> Self {
        self.filter = RoleAccessFilter::new(personas);
        self
    }

    /// Select the active persona. `None` (or a key the registry doesn't
    /// know) lifts every tool restriction.
    pub fn set_persona(&mut self, key: Option<String>) {
        if let Some(k) = key.as_deref()
            && self.filter.personas().get(k).is_none()
        {
            warn!(persona = k, "Unknown persona; tools are unrestricted");
        }
        self.persona = key;
    }

    pub fn persona(&self) -> Option<&AgentProfile> {
        self.persona
            .as_deref()
            .and_then(|k| self.filter.personas().get(k))
    }

    pub fn personas(&self) -> &PersonaRegistry {
        self.filter.personas()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn tool_log(&self) -> &ToolLog {
        &self.tool_log
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn clear_context_cache(&self) {
        self.context.clear();
    }

    /// Write `text` to the foreground process's stdin.
    pub fn forward_input(&self, text: &str) -> bool {
        self.executor.registry().forward_input(text.as_bytes())
    }

    /// Ask the model and vet its actions. Nothing is executed here.
    pub async fn send(&mut self, text: &str) -> Result<Reply, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let snapshot = self.context.get().await;
        let prompt = prompt::compose(&PromptInput {
            persona: self.persona(),
            workspace: &snapshot,
            tool_log: self.tool_log.recent(self.tool_log_window),
            history: &self.history,
            user_text: text,
        });

        info!(
            model = %self.model_name,
            persona = self.persona.as_deref().unwrap_or("-"),
            prompt_chars = prompt.len(),
            "Sending turn to model"
        );
        let response = self
            .model
            .generate(GenerateRequest::text(&self.model_name, prompt))
            .await?;

        let extracted = extract(&response.text());
        let outcome = self
            .filter
            .filter(extracted.actions, self.persona.as_deref());
        debug!(
            allowed = outcome.allowed.len(),
            blocked = outcome.blocked.len(),
            "Model reply parsed"
        );

        let blocked: Vec<ActionResult> = outcome
            .blocked
            .into_iter()
            .map(|b| ActionResult::failed(b.action, b.reason))
            .collect();
        self.tool_log.extend(blocked.iter().cloned());

        self.history.push(Turn::user(text));
        self.history.push(Turn::assistant(&extracted.display_text));

        Ok(Reply {
            display_text: extracted.display_text,
            actions: outcome.allowed,
            blocked,
        })
    }

    /// Execute a batch in order. Within the batch, a repeated command (same
    /// command and cwd) or a repeated open/mkdir/delete of the same path is
    /// skipped. Earlier turns never suppress anything.
    pub async fn apply(&mut self, actions: &[RawAction]) -> Vec<ActionResult> {
        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            let result = match batch_key(action) {
                Some(key) if !seen.insert(key.clone()) => {
                    debug!(key = %key, "Skipping duplicate action in batch");
                    ActionResult::skipped(action.clone(), "Duplicate action in this batch")
                }
                _ => self.executor.execute(action).await,
            };
            results.push(result);
        }

        info!(
            applied = results.len(),
            failed = results.iter().filter(|r| r.status == ActionStatus::Failed).count(),
            "Batch applied"
        );
        self.tool_log.extend(results.iter().cloned());
        results
    }

    /// `send`, then `apply` when `auto_apply` is set.
    pub async fn run_turn(
        &mut self,
        text: &str,
        auto_apply: bool,
    ) -> Result<TurnOutcome, SessionError> {
        let reply = self.send(text).await?;
        let results = if auto_apply {
            self.apply(&reply.actions).await
        } else {
            vec![]
        };
        Ok(TurnOutcome { reply, results })
    }

    /// A follow-up turn asking the model to keep going on the last task.
    pub async fn continue_task(&mut self, auto_apply: bool) -> Result<TurnOutcome, SessionError> {
        self.run_turn(CONTINUE_PROMPT, auto_apply).await
    }
}

fn batch_key(action: &RawAction) -> Option<String> {
    let path = || action.str_field(&["path"]).unwrap_or_default();
    match action.kind()? {
        ActionKind::RunTerminalCommand => Some(format!(
            "runTerminalCommand|{}|{}",
            action.str_field(&["command", "cmd"]).unwrap_or_default(),
            action.str_field(&["cwd"]).unwrap_or_default()
        )),
        kind @ (ActionKind::OpenFile | ActionKind::CreateDirectory | ActionKind::DeletePath) => {
            Some(format!("{}|{}", kind.as_str(), path()))
        }
        _ => None,
    }
}
