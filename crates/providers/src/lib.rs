//! Model service clients for Strata.
//!
//! All clients implement the `strata_core::ModelClient` trait.
//! [`GeminiClient`] talks to the generative-language REST API;
//! [`RetryingClient`] wraps any client with transient-failure retries.

pub mod gemini;
pub mod retry;

pub use gemini::GeminiClient;
pub use retry::{RetryPolicy, RetryingClient};
