//! Action execution for Strata.
//!
//! Turns model output into effects on a workspace:
//! - [`extractor`] pulls the `strata-tools` action list out of model text
//! - [`process`] runs shell commands and tracks long-running ones
//! - [`executor`] dispatches each action onto a concrete effect
//!
//! Effects live in their own modules (filesystem, fetch, memory document,
//! backups, image generation, system status, port killing).

pub mod backup;
pub mod executor;
pub mod extractor;
pub mod fetch;
pub mod fs_ops;
pub mod image;
pub mod kill;
pub mod memory_doc;
pub mod process;
pub mod system;
pub mod text;

pub use executor::ActionExecutor;
pub use extractor::{Extracted, TOOL_BLOCK_TAG, extract, parse_payload};
pub use process::{CommandClassifier, ProcessRegistry, ProcessRunner, RunOptions, RunOutcome};
pub use text::{Utf8Decoder, head_chars, tail_chars};
