//! Agent personas: who the agent is speaking as, and which tools it may use.
//!
//! The registry is immutable once built. Every persona carries its own
//! allowlist of canonical action kinds; an unknown persona key means no
//! restriction at all (see [`crate::RoleAccessFilter`]).

use serde::Serialize;
use std::collections::BTreeSet;
use strata_core::ActionKind;

/// A named agent profile and its tool allowlist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub key: String,
    pub display_name: String,
    pub role: String,
    pub voice_hint: String,
    pub humor_style: String,
    pub allowed_tools: BTreeSet<ActionKind>,
}

impl AgentProfile {
    pub fn allows(&self, kind: ActionKind) -> bool {
        self.allowed_tools.contains(&kind)
    }

    /// Prompt fragment describing the active persona.
    pub fn prompt_block(&self) -> String {
        let mut lines = vec![
            "Active agent:".to_string(),
            format!("- name: {}", self.display_name),
            format!("- role: {}", self.role),
            format!("- voice: {}", self.voice_hint),
            format!("- humor: {}", self.humor_style),
        ];
        if !self.allowed_tools.is_empty() {
            let tools: Vec<&str> = self.allowed_tools.iter().map(|k| k.as_str()).collect();
            lines.push(format!("- allowed_tools: {}", tools.join(", ")));
        }
        lines.push(
            "Instruction: respond as this agent (human-like, natural). Stay strictly within this role."
                .to_string(),
        );
        lines.join("\n")
    }
}

/// Lookup table of all known personas, keyed by their short key.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    profiles: Vec<AgentProfile>,
}

impl PersonaRegistry {
    pub fn new(profiles: Vec<AgentProfile>) -> Self {
        Self { profiles }
    }

    /// The six built-in personas.
    pub fn builtin() -> Self {
        use ActionKind::*;

        let profile = |key: &str,
                       name: &str,
                       role: &str,
                       voice: &str,
                       humor: &str,
                       tools: &[ActionKind]| AgentProfile {
            key: key.into(),
            display_name: name.into(),
            role: role.into(),
            voice_hint: voice.into(),
            humor_style: humor.into(),
            allowed_tools: tools.iter().copied().collect(),
        };

        Self::new(vec![
            profile(
                "architect",
                "Ari",
                "Architect",
                "calm, confident",
                "dry, subtle",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    FetchUrl,
                    ManageMemory,
                    GetSystemStatus,
                    GenerateImage,
                ],
            ),
            profile(
                "researcher",
                "Nova",
                "Researcher",
                "curious, warm",
                "playful, nerdy",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    FetchUrl,
                    ManageMemory,
                    CreateOrOverwriteFile,
                    AppendToFile,
                    GenerateImage,
                ],
            ),
            profile(
                "coder",
                "Byte",
                "Coder",
                "fast, upbeat",
                "witty, punchy",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    CreateDirectory,
                    CreateOrOverwriteFile,
                    AppendToFile,
                    RunTerminalCommand,
                    GenerateImage,
                ],
            ),
            profile(
                "debugger",
                "Patch",
                "Debugger",
                "focused, direct",
                "deadpan",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    CreateOrOverwriteFile,
                    AppendToFile,
                    RunTerminalCommand,
                    KillPort,
                    KillBackgroundProcesses,
                    GetSystemStatus,
                    GenerateImage,
                ],
            ),
            profile(
                "data",
                "Quill",
                "Data Collector",
                "measured, precise",
                "light",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    FetchUrl,
                    CreateOrOverwriteFile,
                    AppendToFile,
                    ManageMemory,
                    GenerateImage,
                ],
            ),
            profile(
                "devops",
                "Pulse",
                "DevOps",
                "steady, pragmatic",
                "practical",
                &[
                    ReadFile,
                    ListFiles,
                    OpenFile,
                    CreateOrOverwriteFile,
                    AppendToFile,
                    RunTerminalCommand,
                    KillPort,
                    KillBackgroundProcesses,
                    GetSystemStatus,
                    CreateBackup,
                    GenerateImage,
                ],
            ),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| p.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.profiles.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.key.as_str()).collect()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
