//! The Strata session loop.
//!
//! Each turn follows the same cycle:
//!
//! 1. **Snapshot** the workspace (cached for a short TTL)
//! 2. **Compose** the prompt: system, persona, workspace, tool log, history
//! 3. **Call** the model through the retrier
//! 4. **Extract** the tool block and **filter** it by persona
//! 5. **Apply** the surviving actions, and log every result for the next turn

pub mod context;
pub mod prompt;
pub mod session;

pub use context::{ContextCache, PackageManager, SnapshotBuilder, WorkspaceSignals, WorkspaceSnapshot};
pub use prompt::{CONTINUE_PROMPT, PromptInput, Role, SYSTEM_PROMPT, Turn};
pub use session::{Reply, Session, SessionError, TurnOutcome};
