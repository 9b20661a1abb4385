//! Model call retrier: exponential backoff over transient failures.
//!
//! A call is retried when the service reports overload or rate limiting, or
//! when it answers with nothing usable (no text and no image). Any other
//! error is returned immediately.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use strata_config::RetryConfig;
use strata_core::error::ProviderError;
use strata_core::provider::*;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `2^attempt * base + jitter`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };
        backoff.saturating_add(Duration::from_millis(jitter))
    }
}

/// Wraps a [`ModelClient`] and retries transient failures.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: ModelClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for RetryingClient<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        let attempts = self.policy.max_retries + 1;

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;

            match self.inner.generate(request.clone()).await {
                Ok(response) if !response.is_blank() => {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "Model call succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(_) => {
                    if last {
                        break;
                    }
                    warn!(attempt = attempt + 1, "Empty model response, retrying");
                }
                Err(e) if e.is_transient() && !last => {
                    warn!(attempt = attempt + 1, error = %e, "Transient model error, retrying");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.policy.delay_for(attempt)).await;
        }

        Err(ProviderError::EmptyResponse { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back a fixed script of outcomes, then repeats the last one.
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _request: GenerateRequest,
        ) -> Result<ModelResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(500),
        }
    }

    #[test]
    fn delay_grows_exponentially_within_jitter() {
        let p = policy(3);
        for attempt in 0..3 {
            let base = Duration::from_millis(1000 * 2u64.pow(attempt));
            let delay = p.delay_for(attempt);
            assert!(delay >= base, "attempt {attempt}: {delay:?}");
            assert!(delay < base + Duration::from_millis(500));
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let p = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
        };
        assert_eq!(p.delay_for(2), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_responses_are_retried_until_text() {
        let model = ScriptedModel::new(vec![
            Ok(ModelResponse::from_text("")),
            Ok(ModelResponse::from_text("   ")),
            Ok(ModelResponse::from_text("hello")),
        ]);
        let client = RetryingClient::new(model, policy(3));

        let response = client.generate(GenerateRequest::text("m", "hi")).await.unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overload_then_success() {
        let model = ScriptedModel::new(vec![
            Err(ProviderError::Overloaded("UNAVAILABLE".into())),
            Err(ProviderError::RateLimited("slow down".into())),
            Ok(ModelResponse::from_text("ok")),
        ]);
        let client = RetryingClient::new(model, policy(3));

        let response = client.generate(GenerateRequest::text("m", "hi")).await.unwrap();
        assert_eq!(response.text(), "ok");
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_is_not_retried() {
        let model = ScriptedModel::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]);
        let client = RetryingClient::new(model, policy(3));

        let err = client.generate(GenerateRequest::text("m", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(client.inner().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_overload_surfaces_last_error() {
        let model = ScriptedModel::new(vec![Err(ProviderError::Overloaded("busy".into()))]);
        let client = RetryingClient::new(model, policy(2));

        let err = client.generate(GenerateRequest::text("m", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_blank_is_an_empty_response_error() {
        let model = ScriptedModel::new(vec![Ok(ModelResponse::default())]);
        let client = RetryingClient::new(model, policy(2));

        let err = client.generate(GenerateRequest::text("m", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { attempts: 3 }));
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn image_only_response_is_not_blank() {
        let model = ScriptedModel::new(vec![Ok(ModelResponse {
            parts: vec![ResponsePart::Image(InlineImage {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            })],
        })]);
        let client = RetryingClient::new(model, policy(3));

        let response = client.generate(GenerateRequest::image("m", "cat")).await.unwrap();
        assert!(response.first_image().is_some());
        assert_eq!(client.inner().calls(), 1);
    }
}
