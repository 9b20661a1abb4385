//! Action schema: the fixed vocabulary of effects the model may request.
//!
//! The model emits loosely-typed actions (`{"type": "write", "path": ...}`).
//! They arrive here as [`RawAction`]s, get their type normalized through a
//! static alias table, and are then lifted into the closed [`Action`] enum
//! the executor matches on exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ActionError;

/// Canonical action types, after alias normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    CreateDirectory,
    CreateOrOverwriteFile,
    AppendToFile,
    DeletePath,
    OpenFile,
    ReadFile,
    ListFiles,
    FetchUrl,
    KillPort,
    KillBackgroundProcesses,
    RunTerminalCommand,
    GetSystemStatus,
    ManageMemory,
    CreateBackup,
    GenerateImage,
}

impl ActionKind {
    pub const ALL: [ActionKind; 15] = [
        Self::CreateDirectory,
        Self::CreateOrOverwriteFile,
        Self::AppendToFile,
        Self::DeletePath,
        Self::OpenFile,
        Self::ReadFile,
        Self::ListFiles,
        Self::FetchUrl,
        Self::KillPort,
        Self::KillBackgroundProcesses,
        Self::RunTerminalCommand,
        Self::GetSystemStatus,
        Self::ManageMemory,
        Self::CreateBackup,
        Self::GenerateImage,
    ];

    /// The canonical wire name (e.g. `"createOrOverwriteFile"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateDirectory => "createDirectory",
            Self::CreateOrOverwriteFile => "createOrOverwriteFile",
            Self::AppendToFile => "appendToFile",
            Self::DeletePath => "deletePath",
            Self::OpenFile => "openFile",
            Self::ReadFile => "readFile",
            Self::ListFiles => "listFiles",
            Self::FetchUrl => "fetchUrl",
            Self::KillPort => "killPort",
            Self::KillBackgroundProcesses => "killBackgroundProcesses",
            Self::RunTerminalCommand => "runTerminalCommand",
            Self::GetSystemStatus => "getSystemStatus",
            Self::ManageMemory => "manageMemory",
            Self::CreateBackup => "createBackup",
            Self::GenerateImage => "generateImage",
        }
    }

    /// Look up a canonical name. Aliases are not accepted here; use
    /// [`ActionKind::resolve`] for raw model output.
    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Normalize a raw type name and map it onto a canonical kind.
    pub fn resolve(raw: &str) -> Option<Self> {
        Self::from_canonical(normalize_type(raw))
    }

    /// Kinds whose missing primary field means "nothing to do" rather than
    /// an error. Such actions are recorded as skipped.
    pub fn skips_when_incomplete(self) -> bool {
        matches!(
            self,
            Self::FetchUrl | Self::KillPort | Self::RunTerminalCommand | Self::GenerateImage
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias table: every non-canonical spelling the model is known to produce.
const ALIASES: &[(&str, ActionKind)] = &[
    ("createFile", ActionKind::CreateOrOverwriteFile),
    ("writeFile", ActionKind::CreateOrOverwriteFile),
    ("write", ActionKind::CreateOrOverwriteFile),
    ("mkdir", ActionKind::CreateDirectory),
    ("rm", ActionKind::DeletePath),
    ("remove", ActionKind::DeletePath),
    ("delete", ActionKind::DeletePath),
    ("exec", ActionKind::RunTerminalCommand),
    ("run", ActionKind::RunTerminalCommand),
    ("command", ActionKind::RunTerminalCommand),
    ("read", ActionKind::ReadFile),
    ("ls", ActionKind::ListFiles),
    ("list", ActionKind::ListFiles),
    ("fetch", ActionKind::FetchUrl),
    ("get", ActionKind::FetchUrl),
    ("open", ActionKind::OpenFile),
    ("append", ActionKind::AppendToFile),
    ("kill", ActionKind::KillPort),
    ("killBackground", ActionKind::KillBackgroundProcesses),
    ("killBackgroundProcs", ActionKind::KillBackgroundProcesses),
    ("imageGen", ActionKind::GenerateImage),
    ("genImage", ActionKind::GenerateImage),
];

/// Map a type alias onto its canonical name. Unmapped names (including
/// canonical ones) pass through unchanged, so this is idempotent.
pub fn normalize_type(raw: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, kind)| kind.as_str())
        .unwrap_or(raw)
}

/// An action exactly as the model wrote it: a type name plus arbitrary fields.
///
/// This is also the `action` field of the result wire shape, so results can
/// always be attributed to the directive that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type", default)]
    pub type_name: String,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawAction {
    /// Build a raw action from a type name and a JSON object of fields.
    /// Non-object `fields` values are ignored.
    pub fn new(type_name: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// The type name after alias normalization.
    pub fn canonical_type(&self) -> &str {
        normalize_type(&self.type_name)
    }

    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::resolve(&self.type_name)
    }

    /// First non-empty string among the given field names.
    pub fn str_field(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
    }

    /// Short human-readable description, used for progress display.
    pub fn describe(&self) -> String {
        let path = self.str_field(&["path"]).unwrap_or("");
        match self.kind() {
            Some(ActionKind::RunTerminalCommand) => {
                let cmd = self.str_field(&["command", "cmd"]).unwrap_or("");
                match self.str_field(&["cwd"]) {
                    Some(cwd) => format!("Run: {cmd} (in {cwd})"),
                    None => format!("Run: {cmd}"),
                }
            }
            Some(ActionKind::CreateDirectory) => format!("Create directory: {path}"),
            Some(ActionKind::CreateOrOverwriteFile) => format!("Create/overwrite file: {path}"),
            Some(ActionKind::AppendToFile) => format!("Append to file: {path}"),
            Some(ActionKind::DeletePath) => format!("Delete path: {path}"),
            Some(ActionKind::OpenFile) => format!("Open file: {path}"),
            Some(ActionKind::ReadFile) => format!("Read file: {path}"),
            Some(ActionKind::ListFiles) => format!("List files: {path}"),
            Some(ActionKind::FetchUrl) => {
                format!("Fetch: {}", self.str_field(&["url"]).unwrap_or(""))
            }
            _ => format!("Action: {}", self.canonical_type()),
        }
    }
}

/// Operations supported by the workspace memory document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOperation {
    Read,
    Write,
    Clear,
}

impl MemoryOperation {
    /// Anything other than `write` or `clear` (including nothing) reads.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("write") => Self::Write,
            Some("clear") => Self::Clear,
            _ => Self::Read,
        }
    }
}

/// A fully-typed action, carrying everything needed to execute it.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateDirectory { path: String },
    CreateOrOverwriteFile { path: String, content: String },
    AppendToFile { path: String, content: String },
    DeletePath { path: String },
    OpenFile { path: String },
    ReadFile { path: String },
    ListFiles { path: String },
    FetchUrl { url: String },
    KillPort { port: u16 },
    KillBackgroundProcesses,
    RunTerminalCommand { command: String, cwd: Option<String> },
    GetSystemStatus,
    ManageMemory {
        operation: MemoryOperation,
        key: Option<String>,
        value: Option<Value>,
    },
    CreateBackup { label: Option<String> },
    GenerateImage {
        prompt: String,
        output_path: Option<String>,
    },
    /// A type that matched neither a canonical name nor an alias.
    Unknown { type_name: String },
}

impl Action {
    pub fn kind(&self) -> Option<ActionKind> {
        Some(match self {
            Self::CreateDirectory { .. } => ActionKind::CreateDirectory,
            Self::CreateOrOverwriteFile { .. } => ActionKind::CreateOrOverwriteFile,
            Self::AppendToFile { .. } => ActionKind::AppendToFile,
            Self::DeletePath { .. } => ActionKind::DeletePath,
            Self::OpenFile { .. } => ActionKind::OpenFile,
            Self::ReadFile { .. } => ActionKind::ReadFile,
            Self::ListFiles { .. } => ActionKind::ListFiles,
            Self::FetchUrl { .. } => ActionKind::FetchUrl,
            Self::KillPort { .. } => ActionKind::KillPort,
            Self::KillBackgroundProcesses => ActionKind::KillBackgroundProcesses,
            Self::RunTerminalCommand { .. } => ActionKind::RunTerminalCommand,
            Self::GetSystemStatus => ActionKind::GetSystemStatus,
            Self::ManageMemory { .. } => ActionKind::ManageMemory,
            Self::CreateBackup { .. } => ActionKind::CreateBackup,
            Self::GenerateImage { .. } => ActionKind::GenerateImage,
            Self::Unknown { .. } => return None,
        })
    }
}

impl TryFrom<&RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: &RawAction) -> Result<Self, Self::Error> {
        let Some(kind) = raw.kind() else {
            return Ok(Self::Unknown {
                type_name: raw.type_name.clone(),
            });
        };

        let required = |names: &[&str], field: &'static str| -> Result<String, ActionError> {
            raw.str_field(names)
                .map(str::to_string)
                .ok_or_else(|| ActionError::MissingField {
                    action: kind.to_string(),
                    field,
                })
        };
        let optional = |name: &str| raw.str_field(&[name]).map(str::to_string);
        let content = || optional_content(raw);

        Ok(match kind {
            ActionKind::CreateDirectory => Self::CreateDirectory {
                path: required(&["path"], "path")?,
            },
            ActionKind::CreateOrOverwriteFile => Self::CreateOrOverwriteFile {
                path: required(&["path"], "path")?,
                content: content(),
            },
            ActionKind::AppendToFile => Self::AppendToFile {
                path: required(&["path"], "path")?,
                content: content(),
            },
            ActionKind::DeletePath => Self::DeletePath {
                path: required(&["path"], "path")?,
            },
            ActionKind::OpenFile => Self::OpenFile {
                path: required(&["path"], "path")?,
            },
            ActionKind::ReadFile => Self::ReadFile {
                path: required(&["path"], "path")?,
            },
            ActionKind::ListFiles => Self::ListFiles {
                path: required(&["path"], "path")?,
            },
            ActionKind::FetchUrl => Self::FetchUrl {
                url: required(&["url"], "url")?,
            },
            ActionKind::KillPort => Self::KillPort {
                port: parse_port(raw)?,
            },
            ActionKind::KillBackgroundProcesses => Self::KillBackgroundProcesses,
            ActionKind::RunTerminalCommand => Self::RunTerminalCommand {
                command: required(&["command", "cmd"], "command")?,
                cwd: optional("cwd"),
            },
            ActionKind::GetSystemStatus => Self::GetSystemStatus,
            ActionKind::ManageMemory => Self::ManageMemory {
                operation: MemoryOperation::parse(
                    raw.fields.get("operation").and_then(Value::as_str),
                ),
                key: optional("key"),
                value: raw.fields.get("value").filter(|v| !v.is_null()).cloned(),
            },
            ActionKind::CreateBackup => Self::CreateBackup {
                label: optional("label"),
            },
            ActionKind::GenerateImage => Self::GenerateImage {
                prompt: required(&["prompt"], "prompt")?,
                output_path: optional("outputPath"),
            },
        })
    }
}

/// `content` wins over `contents`; an absent body writes an empty file.
fn optional_content(raw: &RawAction) -> String {
    ["content", "contents"]
        .iter()
        .find_map(|name| raw.fields.get(*name).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn parse_port(raw: &RawAction) -> Result<u16, ActionError> {
    let invalid = |reason: String| ActionError::InvalidField {
        action: ActionKind::KillPort.to_string(),
        field: "port",
        reason,
    };
    let port = match raw.fields.get("port") {
        None | Some(Value::Null) => {
            return Err(ActionError::MissingField {
                action: ActionKind::KillPort.to_string(),
                field: "port",
            });
        }
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| invalid(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(format!("'{s}' is not a number")))?,
        Some(other) => return Err(invalid(format!("unexpected value {other}"))),
    };
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(invalid(format!("{port} is out of range"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(normalize_type("write"), "createOrOverwriteFile");
        assert_eq!(normalize_type("mkdir"), "createDirectory");
        assert_eq!(normalize_type("rm"), "deletePath");
        assert_eq!(normalize_type("exec"), "runTerminalCommand");
        assert_eq!(normalize_type("ls"), "listFiles");
        assert_eq!(normalize_type("get"), "fetchUrl");
        assert_eq!(normalize_type("kill"), "killPort");
        assert_eq!(normalize_type("killBackgroundProcs"), "killBackgroundProcesses");
        assert_eq!(normalize_type("genImage"), "generateImage");
    }

    #[test]
    fn unknown_types_pass_through() {
        assert_eq!(normalize_type("teleport"), "teleport");
        assert_eq!(normalize_type(""), "");
        assert!(ActionKind::resolve("teleport").is_none());
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = ALIASES
            .iter()
            .map(|(alias, _)| *alias)
            .chain(ActionKind::ALL.iter().map(|k| k.as_str()))
            .chain(["teleport", "WRITE", ""]);
        for input in inputs {
            let once = normalize_type(input);
            assert_eq!(normalize_type(once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_canonical(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn raw_action_keeps_extra_fields() {
        let raw: RawAction =
            serde_json::from_value(json!({"type": "write", "path": "a.txt", "contents": "hi"}))
                .unwrap();
        assert_eq!(raw.type_name, "write");
        assert_eq!(raw.canonical_type(), "createOrOverwriteFile");
        let back = serde_json::to_value(&raw).unwrap();
        assert_eq!(back["contents"], "hi");
        assert_eq!(back["type"], "write");
    }

    #[test]
    fn typed_action_accepts_contents_alias() {
        let raw = RawAction::new("append", json!({"path": "log.txt", "contents": "line"}));
        let action = Action::try_from(&raw).unwrap();
        assert_eq!(
            action,
            Action::AppendToFile {
                path: "log.txt".into(),
                content: "line".into()
            }
        );
    }

    #[test]
    fn typed_action_accepts_cmd_alias() {
        let raw = RawAction::new("run", json!({"cmd": "ls", "cwd": "web"}));
        let action = Action::try_from(&raw).unwrap();
        assert_eq!(
            action,
            Action::RunTerminalCommand {
                command: "ls".into(),
                cwd: Some("web".into())
            }
        );
    }

    #[test]
    fn missing_path_is_an_error() {
        let raw = RawAction::new("readFile", json!({}));
        let err = Action::try_from(&raw).unwrap_err();
        assert!(matches!(err, ActionError::MissingField { field: "path", .. }));
    }

    #[test]
    fn port_accepts_numbers_and_numeric_strings() {
        let a = Action::try_from(&RawAction::new("killPort", json!({"port": 3000}))).unwrap();
        assert_eq!(a, Action::KillPort { port: 3000 });
        let b = Action::try_from(&RawAction::new("kill", json!({"port": "5173"}))).unwrap();
        assert_eq!(b, Action::KillPort { port: 5173 });
        let c = Action::try_from(&RawAction::new("killPort", json!({"port": 70000})));
        assert!(matches!(c, Err(ActionError::InvalidField { .. })));
    }

    #[test]
    fn unknown_type_becomes_unknown_variant() {
        let raw = RawAction::new("teleport", json!({"to": "mars"}));
        let action = Action::try_from(&raw).unwrap();
        assert_eq!(
            action,
            Action::Unknown {
                type_name: "teleport".into()
            }
        );
        assert!(action.kind().is_none());
    }

    #[test]
    fn memory_operation_defaults_to_read() {
        assert_eq!(MemoryOperation::parse(None), MemoryOperation::Read);
        assert_eq!(MemoryOperation::parse(Some("bogus")), MemoryOperation::Read);
        assert_eq!(MemoryOperation::parse(Some("write")), MemoryOperation::Write);
        assert_eq!(MemoryOperation::parse(Some("clear")), MemoryOperation::Clear);
    }

    #[test]
    fn describe_run_command_with_cwd() {
        let raw = RawAction::new("exec", json!({"command": "npm test", "cwd": "web"}));
        assert_eq!(raw.describe(), "Run: npm test (in web)");
    }
}
