//! Workspace context for prompts.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`SnapshotBuilder`] | Walks the workspace and renders a bounded snapshot |
//! | [`ContextCache`] | Memoizes the last snapshot for a fixed TTL |

pub mod cache;
pub mod snapshot;

pub use cache::ContextCache;
pub use snapshot::{PackageManager, SnapshotBuilder, WorkspaceSignals, WorkspaceSnapshot};
