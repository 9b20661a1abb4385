//! Action results and the session tool log.

use serde::{Deserialize, Serialize};

use crate::action::RawAction;

/// Outcome classification of a single executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
    /// A long-running process that is still alive in the background.
    Running,
    /// Not executed: missing required input, or a duplicate in the same batch.
    Skipped,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of executing one action.
///
/// Serialized shape: `{action, status, exitCode?, outputTail?, message?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action: RawAction,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn success(action: RawAction, message: impl Into<String>) -> Self {
        Self {
            action,
            status: ActionStatus::Success,
            exit_code: None,
            output_tail: None,
            message: Some(message.into()),
        }
    }

    pub fn failed(action: RawAction, message: impl Into<String>) -> Self {
        Self {
            action,
            status: ActionStatus::Failed,
            exit_code: None,
            output_tail: None,
            message: Some(message.into()),
        }
    }

    pub fn skipped(action: RawAction, message: impl Into<String>) -> Self {
        Self {
            action,
            status: ActionStatus::Skipped,
            exit_code: None,
            output_tail: None,
            message: Some(message.into()),
        }
    }

    /// Attach command details (exit code and captured output tail).
    pub fn with_process(mut self, exit_code: Option<i32>, output_tail: impl Into<String>) -> Self {
        self.exit_code = exit_code;
        let tail = output_tail.into();
        self.output_tail = (!tail.is_empty()).then_some(tail);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Ordered history of every action result produced in a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolLog {
    entries: Vec<ActionResult>,
}

impl ToolLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ActionResult) {
        self.entries.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ActionResult>) {
        self.entries.extend(results);
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[ActionResult] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[ActionResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_serializes_to_camel_case_without_empty_fields() {
        let raw = RawAction::new("runTerminalCommand", json!({"command": "ls"}));
        let result = ActionResult::success(raw, "exit=0").with_process(Some(0), "a\nb\n");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["exitCode"], 0);
        assert_eq!(value["outputTail"], "a\nb\n");
        assert_eq!(value["action"]["type"], "runTerminalCommand");

        let bare = ActionResult::skipped(RawAction::new("fetchUrl", json!({})), "no url");
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("exitCode").is_none());
        assert!(value.get("outputTail").is_none());
        assert_eq!(value["status"], "skipped");
    }

    #[test]
    fn tool_log_recent_returns_tail_in_order() {
        let mut log = ToolLog::new();
        for i in 0..30 {
            log.push(ActionResult::success(
                RawAction::new("readFile", json!({"path": format!("f{i}")})),
                format!("read {i}"),
            ));
        }
        let recent = log.recent(25);
        assert_eq!(recent.len(), 25);
        assert_eq!(recent[0].message.as_deref(), Some("read 5"));
        assert_eq!(recent[24].message.as_deref(), Some("read 29"));
        assert_eq!(log.recent(100).len(), 30);
    }
}
