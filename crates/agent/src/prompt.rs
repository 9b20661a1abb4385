//! Prompt composition.
//!
//! Layout of a full prompt, top to bottom:
//!
//! 1. System prompt (tool vocabulary and output format)
//! 2. Active persona block, when a persona is selected
//! 3. Workspace snapshot
//! 4. Recent tool log
//! 5. Conversation history
//! 6. The user message, followed by any meta instructions

use serde::{Deserialize, Serialize};
use strata_core::{ActionKind, ActionResult};
use strata_security::AgentProfile;

use crate::context::{WorkspaceSignals, WorkspaceSnapshot};

/// Message sent for an automatic follow-up turn.
pub const CONTINUE_PROMPT: &str = "Continue the previous task automatically. Based on our last conversation and actions, propose the next concrete steps and strata-tools needed to move the project closer to done.";

const TOOL_LOG_MESSAGE_CHARS: usize = 320;
const TOOL_LOG_OUTPUT_CHARS: usize = 380;

const SCAFFOLD_KEYWORDS: &[&str] = &[
    "scaffold",
    "create project",
    "create a project",
    "full saas",
    "build a saas",
    "create app",
    "create an app",
    "generate app",
    "scaffold app",
    "production ready",
    "production-grade",
];

pub const SYSTEM_PROMPT: &str = r#"You are Strata, an autonomous coding agent working inside the user's project workspace.

Work like a senior engineer: infer the real intent behind terse requests, state assumptions briefly, and prefer root-cause fixes. Treat terminal output, compiler errors and logs as ground truth. Read the workspace context below before assuming anything about the project.

RESPONSE MODES
- Answer mode: questions, explanations, status updates, or when you need confirmation. Reply in a few focused sentences and emit no tool block.
- Tool mode: when concrete work is needed. Emit exactly one tool block containing valid JSON:
  ```strata-tools
  { "actions": [ ... ] }
  ```
- Ask before risky or irreversible work (deleting data, killing processes, pushing to remotes).
- When the request is complete, summarize what was done and how to verify it.

TOOLS
- runTerminalCommand: { "type": "runTerminalCommand", "command": "...", "cwd": "..." }  (cwd optional; "cmd" is accepted for "command")
- createDirectory: { "type": "createDirectory", "path": "..." }
- createOrOverwriteFile: { "type": "createOrOverwriteFile", "path": "...", "contents": "..." }
- appendToFile: { "type": "appendToFile", "path": "...", "contents": "..." }
- deletePath: { "type": "deletePath", "path": "..." }
- openFile: { "type": "openFile", "path": "..." }
- readFile: { "type": "readFile", "path": "..." }
- listFiles: { "type": "listFiles", "path": "..." }
- fetchUrl: { "type": "fetchUrl", "url": "..." }
- killPort: { "type": "killPort", "port": 3000 }
- killBackgroundProcesses: { "type": "killBackgroundProcesses" }
- getSystemStatus: { "type": "getSystemStatus" }
- manageMemory: { "type": "manageMemory", "operation": "read|write|clear", "key": "...", "value": ... }
- createBackup: { "type": "createBackup", "label": "..." }
- generateImage: { "type": "generateImage", "prompt": "detailed description", "outputPath": "relative/path.png" }

TERMINAL
- One command per runTerminalCommand; chain with && only when necessary.
- Set cwd whenever the command depends on it.
- Dev servers keep running in the background. To restart one, kill background processes, clear the port, then rerun the same command with an explicit port.
- If a command fails, diagnose from its output and change something before retrying."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Everything that goes into one prompt.
pub struct PromptInput<'a> {
    pub persona: Option<&'a AgentProfile>,
    pub workspace: &'a WorkspaceSnapshot,
    pub tool_log: &'a [ActionResult],
    pub history: &'a [Turn],
    pub user_text: &'a str,
}

pub fn compose(input: &PromptInput<'_>) -> String {
    let persona = input
        .persona
        .map(|p| format!("{}\n\n", p.prompt_block()))
        .unwrap_or_default();
    let workspace = if input.workspace.is_empty() {
        String::new()
    } else {
        format!("{}\n", input.workspace.text)
    };

    format!(
        "{SYSTEM_PROMPT}\n\n{persona}{workspace}{}{}User message:\n{}{}",
        format_tool_log(input.tool_log),
        format_history(input.history, input.user_text),
        input.user_text,
        meta_instructions(input.user_text, &input.workspace.signals),
    )
}

/// One line per result, or the empty string for an empty log.
pub fn format_tool_log(results: &[ActionResult]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = results.iter().map(tool_log_line).collect();
    format!(
        "Recent tool actions (applied/skipped/failed):\n{}\n\n",
        lines.join("\n")
    )
}

fn tool_log_line(result: &ActionResult) -> String {
    let action = &result.action;
    let mut line = format!("- {}: {}", result.status, action.canonical_type());

    let command = match action.kind() {
        Some(ActionKind::RunTerminalCommand) => action.str_field(&["command", "cmd"]),
        _ => None,
    };
    if let Some(cmd) = command {
        line.push_str(&format!(" cmd={cmd}"));
    } else if let Some(path) = action.str_field(&["path"]) {
        line.push_str(&format!(" path={path}"));
    }
    if let Some(cwd) = action.str_field(&["cwd"]) {
        line.push_str(&format!(" cwd={cwd}"));
    }

    let message = collapse_whitespace(result.message.as_deref().unwrap_or_default());
    if !message.is_empty() {
        line.push_str(" msg=");
        match message.char_indices().nth(TOOL_LOG_MESSAGE_CHARS) {
            Some((cut, _)) => {
                line.push_str(&message[..cut]);
                line.push('…');
            }
            None => line.push_str(&message),
        }
    }

    let output = collapse_whitespace(result.output_tail.as_deref().unwrap_or_default());
    if !output.is_empty() {
        line.push_str(" out=");
        let count = output.chars().count();
        if count > TOOL_LOG_OUTPUT_CHARS {
            line.push('…');
            line.extend(output.chars().skip(count - TOOL_LOG_OUTPUT_CHARS));
        } else {
            line.push_str(&output);
        }
    }
    line
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// History rendered as `Role: text` lines. A trailing user turn equal to the
/// current message is left out, since the message is appended separately.
pub fn format_history(history: &[Turn], user_text: &str) -> String {
    let history = match history.split_last() {
        Some((last, rest)) if last.role == Role::User && last.text.trim() == user_text.trim() => {
            rest
        }
        _ => history,
    };
    if history.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = history
        .iter()
        .map(|turn| {
            let label = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{label}: {}", turn.text)
        })
        .collect();
    format!("Conversation so far:\n{}\n\n", lines.join("\n"))
}

pub fn meta_instructions(user_text: &str, signals: &WorkspaceSignals) -> String {
    let mut meta = String::new();
    let lowered = user_text.to_lowercase();
    if SCAFFOLD_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        meta.push_str(
            "\n\nMeta instruction: The user is asking you to build or scaffold a real project. \
             Respond with a strata-tools block that creates the directories and files and runs the key commands. \
             Do not paste code into chat when a tool can write it.",
        );
    }
    if signals.has_projects && signals.needs_install {
        let pm = signals
            .package_manager
            .map_or("npm", |pm| pm.as_str());
        meta.push_str(&format!(
            "\n\nMeta instruction: This workspace contains a Node project whose dependencies are not installed (node_modules missing). \
             Propose strata-tools that run `{pm} install`, then start the project with the appropriate script (dev/start) if needed."
        ));
    }
    meta
}
