//! Role access filter: partitions a batch of actions by persona allowlist.

use serde::Serialize;
use strata_core::RawAction;

use crate::personas::PersonaRegistry;

/// An action that was refused, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedAction {
    pub action: RawAction,
    pub reason: String,
}

/// Result of filtering a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOutcome {
    /// Allowed actions, in input order
    pub allowed: Vec<RawAction>,
    pub blocked: Vec<BlockedAction>,
}

/// Stateless allowlist enforcement over a persona registry.
#[derive(Debug, Clone, Default)]
pub struct RoleAccessFilter {
    personas: PersonaRegistry,
}

impl RoleAccessFilter {
    pub fn new(personas: PersonaRegistry) -> Self {
        Self { personas }
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    /// Partition `actions` for the given persona.
    ///
    /// Rules:
    /// - No persona, or a key the registry doesn't know → allow everything
    /// - Otherwise the action's normalized type must be in the allowlist;
    ///   unknown types are never in any allowlist
    pub fn filter(&self, actions: Vec<RawAction>, persona: Option<&str>) -> FilterOutcome {
        let Some(profile) = persona.and_then(|key| self.personas.get(key)) else {
            return FilterOutcome {
                allowed: actions,
                blocked: vec![],
            };
        };

        let mut outcome = FilterOutcome::default();
        for action in actions {
            if action.kind().is_some_and(|kind| profile.allows(kind)) {
                outcome.allowed.push(action);
            } else {
                tracing::debug!(
                    persona = %profile.key,
                    action = %action.type_name,
                    "Action blocked by role allowlist"
                );
                outcome.blocked.push(BlockedAction {
                    action,
                    reason: format!("Tool not allowed for role: {}", profile.key),
                });
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetch() -> RawAction {
        RawAction::new("fetchUrl", json!({"url": "https://x"}))
    }

    #[test]
    fn no_persona_allows_everything() {
        let filter = RoleAccessFilter::default();
        let actions = vec![
            fetch(),
            RawAction::new("teleport", json!({})),
            RawAction::new("rm", json!({"path": "x"})),
        ];
        let outcome = filter.filter(actions.clone(), None);
        assert_eq!(outcome.allowed, actions);
        assert!(outcome.blocked.is_empty());
    }

    #[test]
    fn unknown_persona_allows_everything() {
        let filter = RoleAccessFilter::default();
        let outcome = filter.filter(vec![fetch()], Some("wizard"));
        assert_eq!(outcome.allowed.len(), 1);
        assert!(outcome.blocked.is_empty());
    }

    #[test]
    fn debugger_cannot_fetch_but_researcher_can() {
        let filter = RoleAccessFilter::default();

        let outcome = filter.filter(vec![fetch()], Some("debugger"));
        assert!(outcome.allowed.is_empty());
        assert_eq!(outcome.blocked.len(), 1);
        assert_eq!(outcome.blocked[0].reason, "Tool not allowed for role: debugger");

        let outcome = filter.filter(vec![fetch()], Some("researcher"));
        assert_eq!(outcome.allowed.len(), 1);
        assert!(outcome.blocked.is_empty());
    }

    #[test]
    fn aliases_are_checked_after_normalization() {
        let filter = RoleAccessFilter::default();
        let outcome = filter.filter(
            vec![
                RawAction::new("exec", json!({"command": "ls"})),
                RawAction::new("get", json!({"url": "https://x"})),
                RawAction::new("write", json!({"path": "a", "content": ""})),
            ],
            Some("coder"),
        );
        let allowed: Vec<&str> = outcome.allowed.iter().map(|a| a.type_name.as_str()).collect();
        assert_eq!(allowed, vec!["exec", "write"]);
        assert_eq!(outcome.blocked[0].action.type_name, "get");
    }

    #[test]
    fn unknown_type_is_blocked_for_a_known_persona() {
        let filter = RoleAccessFilter::default();
        let outcome = filter.filter(vec![RawAction::new("teleport", json!({}))], Some("devops"));
        assert_eq!(outcome.blocked.len(), 1);
    }
}
