//! # Strata Core
//!
//! Domain types, traits, and error definitions for the Strata execution engine.
//! This crate defines the action vocabulary the model speaks, the results the
//! executor produces, and the seams (model client, output stream) every
//! other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is defined here. Implementations live in their
//! respective crates, so tests can swap in scripted models and in-memory
//! sinks without touching the network or a terminal.

pub mod action;
pub mod error;
pub mod output;
pub mod provider;
pub mod result;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionKind, MemoryOperation, RawAction, normalize_type};
pub use error::{ActionError, ProviderError};
pub use output::{OutputEvent, OutputStream};
pub use provider::{
    GenerateRequest, InlineImage, Modality, ModelClient, ModelResponse, ResponsePart,
};
pub use result::{ActionResult, ActionStatus, ToolLog};
