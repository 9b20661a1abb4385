//! ModelClient trait: the abstraction over the remote generative model.
//!
//! A client takes a single prompt and returns a response made of parts:
//! text, or inline images for image-generation requests.
//!
//! Implementations: the Gemini REST client, the retrying wrapper, and
//! scripted clients in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Output modalities a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The model to use (e.g., "gemini-3-pro-preview")
    pub model: String,

    /// The full prompt text
    pub prompt: String,

    /// Requested response modalities. Empty means text only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<Modality>,
}

impl GenerateRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            modalities: Vec::new(),
        }
    }

    pub fn image(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            modalities: vec![Modality::Text, Modality::Image],
        }
    }
}

/// Base64-encoded image data returned inline by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// File extension matching the mime type (`image/jpeg` -> `jpg`).
    pub fn extension(&self) -> &str {
        match self.mime_type.split('/').nth(1).unwrap_or("png") {
            "jpeg" => "jpg",
            "" => "png",
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePart {
    Text(String),
    Image(InlineImage),
}

/// A complete model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(text.into())],
        }
    }

    /// Concatenation of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.as_str()),
                ResponsePart::Image(_) => None,
            })
            .collect()
    }

    pub fn first_image(&self) -> Option<&InlineImage> {
        self.parts.iter().find_map(|p| match p {
            ResponsePart::Image(img) => Some(img),
            ResponsePart::Text(_) => None,
        })
    }

    /// True when there is no usable content: no image and only blank text.
    pub fn is_blank(&self) -> bool {
        self.first_image().is_none() && self.text().trim().is_empty()
    }
}

/// The core model client trait.
///
/// The session calls `generate()` without knowing whether it is talking to
/// the network, a retrying wrapper, or a scripted test double.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "gemini").
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError>;
}
