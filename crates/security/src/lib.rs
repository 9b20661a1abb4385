//! Security module for Strata: persona allowlists and path resolution.
//!
//! Provides:
//! - **Personas**: the fixed set of agent profiles and the tools each may use
//! - **Role filtering**: partition a batch of actions into allowed/blocked
//! - **Path resolution**: map action paths onto the workspace root

pub mod filter;
pub mod path;
pub mod personas;

pub use filter::{BlockedAction, FilterOutcome, RoleAccessFilter};
pub use path::resolve_workspace_path;
pub use personas::{AgentProfile, PersonaRegistry};
