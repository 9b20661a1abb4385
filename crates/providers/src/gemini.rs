//! Gemini REST client.
//!
//! `POST {api_url}/models/{model}:generateContent` with a single user turn.
//! Text parts and inline images in the first candidate become the
//! [`ModelResponse`] parts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_config::ModelConfig;
use strata_core::error::ProviderError;
use strata_core::provider::*;
use tracing::{debug, warn};

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn from_config(config: &ModelConfig, api_key: impl Into<String>) -> Self {
        Self::new(&config.api_url, api_key)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    fn request_body(request: &GenerateRequest) -> ApiRequest {
        ApiRequest {
            contents: vec![ApiContent {
                role: Some("user".into()),
                parts: vec![ApiPart {
                    text: Some(request.prompt.clone()),
                    inline_data: None,
                }],
            }],
            generation_config: (!request.modalities.is_empty()).then(|| GenerationConfig {
                response_modalities: request.modalities.clone(),
            }),
        }
    }

    fn into_response(api: ApiResponse) -> ModelResponse {
        let parts = api
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| match (part.inline_data, part.text) {
                (Some(data), _) if !data.data.is_empty() => Some(ResponsePart::Image(InlineImage {
                    mime_type: data.mime_type.unwrap_or_else(|| "image/png".into()),
                    data: data.data,
                })),
                (_, Some(text)) => Some(ResponsePart::Text(text)),
                _ => None,
            })
            .collect();
        ModelResponse { parts }
    }
}

/// Map a non-success HTTP status and body onto the error taxonomy.
fn status_error(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|env| {
            let status_text = env.error.status.unwrap_or_default();
            format!("{} {}", env.error.message, status_text).trim().to_string()
        })
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        429 => ProviderError::RateLimited(detail),
        503 => ProviderError::Overloaded(detail),
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: detail,
        },
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("missing API key".into()));
        }

        debug!(model = %request.model, modalities = ?request.modalities, "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Model service returned error");
            return Err(status_error(status, &body));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Ok(Self::into_response(api))
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<Modality>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new("https://example.test/v1beta/", "k");
        assert_eq!(
            client.endpoint("gemini-3-pro-preview"),
            "https://example.test/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[test]
    fn text_request_has_no_generation_config() {
        let body = serde_json::to_value(GeminiClient::request_body(&GenerateRequest::text(
            "m", "hello",
        )))
        .unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn image_request_asks_for_modalities() {
        let body = serde_json::to_value(GeminiClient::request_body(&GenerateRequest::image(
            "m", "a cat",
        )))
        .unwrap();
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn response_parts_are_converted() {
        let api: ApiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Here it is."},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "AAAA"}}
                    ]
                }
            }]
        }))
        .unwrap();
        let response = GeminiClient::into_response(api);
        assert_eq!(response.text(), "Here it is.");
        assert_eq!(response.first_image().unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn no_candidates_is_a_blank_response() {
        let api: ApiResponse = serde_json::from_value(json!({"promptFeedback": {}})).unwrap();
        assert!(GeminiClient::into_response(api).is_blank());
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}"#;
        let err = status_error(503, body);
        assert!(matches!(err, ProviderError::Overloaded(ref m) if m.contains("UNAVAILABLE")));
        assert!(err.is_transient());

        assert!(matches!(status_error(429, "slow"), ProviderError::RateLimited(_)));
        assert!(matches!(
            status_error(401, ""),
            ProviderError::AuthenticationFailed(_)
        ));

        let err = status_error(400, r#"{"error": {"message": "bad", "status": "INVALID_ARGUMENT"}}"#);
        assert!(matches!(err, ProviderError::ApiError { status_code: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_key_is_not_configured() {
        let client = GeminiClient::new("http://127.0.0.1:9", "  ");
        let err = client.generate(GenerateRequest::text("m", "hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn round_trip_against_local_server() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"candidates":[{"content":{"parts":[{"text":"pong"}]}}]}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let client = GeminiClient::new(format!("http://{addr}"), "test-key");
        let response = client.generate(GenerateRequest::text("m", "ping")).await.unwrap();
        assert_eq!(response.text(), "pong");
    }
}
