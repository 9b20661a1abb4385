//! Process runner: spawns shell commands, streams their output, and keeps
//! track of the ones that outlive their foreground wait.

pub mod chain;
pub mod classify;
pub mod registry;
pub mod runner;
pub mod tail;

pub use chain::split_chain;
pub use classify::{CommandClassifier, DEFAULT_LONG_RUNNING_PATTERNS};
pub use registry::{ProcessHandle, ProcessRegistry};
pub use runner::{ProcessRunner, RunOptions, RunOutcome};
pub use tail::TailBuffer;
