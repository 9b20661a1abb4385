//! Tool-call extractor: pulls the action list out of model free text.
//!
//! The model embeds its directives in a fenced block tagged `strata-tools`:
//!
//! ````text
//! Sure, creating the file now.
//! ```strata-tools
//! {"actions": [{"type": "write", "path": "a.txt", "content": "hi"}]}
//! ```
//! ````
//!
//! Only the first such block is honored. A malformed block never fails the
//! turn: it is logged and yields no actions.

use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use strata_core::RawAction;
use tracing::{debug, warn};

/// Info-string tag that marks a tool-call block.
pub const TOOL_BLOCK_TAG: &str = "strata-tools";

/// The model text split into prose and actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Input with the tool block removed, trimmed
    pub display_text: String,
    pub actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct ToolPayload {
    #[serde(default)]
    actions: Vec<Value>,
}

fn tool_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```\s*strata-tools\s*(.*?)```").expect("tool block regex is valid")
    })
}

/// Split raw model output into display text and actions.
pub fn extract(raw: &str) -> Extracted {
    let Some(captures) = tool_block_regex().captures(raw) else {
        return Extracted {
            display_text: raw.to_string(),
            actions: vec![],
        };
    };

    // Group 0 always exists on a match.
    let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
        return Extracted {
            display_text: raw.to_string(),
            actions: vec![],
        };
    };

    let display_text = format!("{}{}", &raw[..whole.start()], &raw[whole.end()..])
        .trim()
        .to_string();

    let json_text = body.as_str().trim();
    let actions = match parse_payload(json_text) {
        Ok(actions) => actions,
        Err(e) => {
            warn!(error = %e, "Failed to parse {TOOL_BLOCK_TAG} JSON; ignoring tool block");
            debug!(payload = %json_text, "Malformed tool block");
            vec![]
        }
    };

    Extracted {
        display_text,
        actions,
    }
}

/// Parse a bare `{"actions": [...]}` payload.
pub fn parse_payload(json_text: &str) -> Result<Vec<RawAction>, serde_json::Error> {
    let payload: ToolPayload = serde_json::from_str(json_text)?;
    Ok(payload
        .actions
        .into_iter()
        .filter_map(into_raw_action)
        .collect())
}

/// Elements must be objects with a string `type`; anything else is dropped.
fn into_raw_action(value: Value) -> Option<RawAction> {
    if !value.get("type").is_some_and(Value::is_string) {
        warn!(element = %value, "Dropping tool action without a string 'type'");
        return None;
    }
    serde_json::from_value(value)
        .map_err(|e| warn!(error = %e, "Dropping unreadable tool action"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_block_is_returned_unchanged() {
        let raw = "  Just some prose.\n";
        let out = extract(raw);
        assert_eq!(out.display_text, raw);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn extracts_actions_and_strips_block() {
        let raw = "Creating it now.\n```strata-tools\n{\"actions\": [{\"type\": \"write\", \"path\": \"a.txt\", \"content\": \"hi\"}, {\"type\": \"exec\", \"command\": \"ls\"}]}\n```\nDone.";
        let out = extract(raw);
        assert_eq!(out.display_text, "Creating it now.\n\nDone.");
        assert_eq!(out.actions.len(), 2);
        assert_eq!(out.actions[0].type_name, "write");
        assert_eq!(out.actions[0].str_field(&["path"]), Some("a.txt"));
        assert_eq!(out.actions[1].canonical_type(), "runTerminalCommand");
    }

    #[test]
    fn tag_match_is_case_insensitive() {
        let raw = "```STRATA-TOOLS {\"actions\": [{\"type\": \"ls\", \"path\": \".\"}]}```";
        let out = extract(raw);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.display_text, "");
    }

    #[test]
    fn malformed_block_yields_no_actions_but_keeps_prose() {
        let raw = "Here you go.\n```strata-tools\n{\"actions\": [ {\"type\": \"write\", }\n```\nThanks";
        let out = extract(raw);
        assert!(out.actions.is_empty());
        assert_eq!(out.display_text, "Here you go.\n\nThanks");
    }

    #[test]
    fn only_the_first_block_is_honored() {
        let raw = "a\n```strata-tools\n{\"actions\": [{\"type\": \"readFile\", \"path\": \"1\"}]}\n```\nb\n```strata-tools\n{\"actions\": [{\"type\": \"readFile\", \"path\": \"2\"}]}\n```";
        let out = extract(raw);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].str_field(&["path"]), Some("1"));
        assert!(out.display_text.contains("b\n```strata-tools"));
    }

    #[test]
    fn missing_actions_field_means_no_actions() {
        let out = extract("```strata-tools\n{\"steps\": []}\n```");
        assert!(out.actions.is_empty());
    }

    #[test]
    fn elements_without_type_are_dropped() {
        let raw = "```strata-tools\n{\"actions\": [{\"path\": \"x\"}, 42, {\"type\": \"mkdir\", \"path\": \"d\"}]}\n```";
        let out = extract(raw);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].type_name, "mkdir");
    }

    #[test]
    fn bare_payload_parses() {
        let actions =
            parse_payload(r#"{"actions": [{"type": "rm", "path": "old"}, {"path": "x"}]}"#).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].canonical_type(), "deletePath");
        assert!(parse_payload("not json").is_err());
    }

    #[test]
    fn other_fenced_blocks_are_left_alone() {
        let raw = "```rust\nfn main() {}\n```";
        let out = extract(raw);
        assert_eq!(out.display_text, raw);
        assert!(out.actions.is_empty());
    }
}
