//! Error types for the Strata domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum: model calls fail with
//! [`ProviderError`], single actions with [`ActionError`]. Configuration and
//! session errors live with their crates.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by model service (429): {0}")]
    RateLimited(String),

    #[error("Model service overloaded (503 UNAVAILABLE): {0}")]
    Overloaded(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model service returned an empty response after {attempts} attempts")]
    EmptyResponse { attempts: u32 },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this failure is worth retrying: rate limits, overload signals,
    /// and any error whose text carries those markers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Overloaded(_) => true,
            Self::ApiError { status_code, message } => {
                matches!(status_code, 429 | 503) || has_transient_marker(message)
            }
            Self::Network(message) => has_transient_marker(message),
            _ => false,
        }
    }
}

fn has_transient_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("503")
        || lower.contains("429")
        || lower.contains("overloaded")
        || lower.contains("unavailable")
        || lower.contains("rate limit")
}

/// Failures raised while executing a single action. The executor converts
/// every one of these into a `failed` (or `skipped`) `ActionResult`.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No workspace folder is open.")]
    NoWorkspace,

    #[error("Missing '{field}' for {action}")]
    MissingField { action: String, field: &'static str },

    #[error("Invalid '{field}' for {action}: {reason}")]
    InvalidField {
        action: String,
        field: &'static str,
        reason: String,
    },

    #[error("Unsupported action type: {0}")]
    Unsupported(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Image generation did not return an image. {0}")]
    NoImage(String),

    #[error("Model service error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ActionError {
    /// Convenience constructor for I/O failures tagged with the path involved.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 500,
            message: "Internal".into(),
        };
        assert_eq!(err.to_string(), "API request failed: Internal (status: 500)");
    }

    #[test]
    fn provider_failures_surface_through_action_errors() {
        let err: ActionError = ProviderError::Overloaded("busy".into()).into();
        assert_eq!(
            err.to_string(),
            "Model service error: Model service overloaded (503 UNAVAILABLE): busy"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited("slow down".into()).is_transient());
        assert!(ProviderError::Overloaded("busy".into()).is_transient());
        assert!(
            ProviderError::ApiError {
                status_code: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            ProviderError::ApiError {
                status_code: 500,
                message: "The model is overloaded".into()
            }
            .is_transient()
        );
        assert!(ProviderError::Network("status UNAVAILABLE".into()).is_transient());
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "invalid argument".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn action_error_mentions_field() {
        let err = ActionError::MissingField {
            action: "readFile".into(),
            field: "path",
        };
        assert_eq!(err.to_string(), "Missing 'path' for readFile");
    }
}
