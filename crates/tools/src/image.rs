//! Image generation effect: ask the model for an image and save it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use strata_core::{ActionError, GenerateRequest, ModelClient};
use strata_security::resolve_workspace_path;

/// Default output folder for generated images, relative to the workspace.
pub const GENERATED_IMAGES_DIR: &str = "generated-images";

/// A saved image and whatever text the model sent alongside it.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub path: PathBuf,
    pub bytes: usize,
    pub caption: String,
}

impl GeneratedImage {
    /// `Image generated and saved to ./generated-images/x.png`, plus caption.
    pub fn summary(&self, root: Option<&Path>) -> String {
        let shown = root
            .and_then(|r| self.path.strip_prefix(r).ok())
            .map(|rel| format!("./{}", rel.display()))
            .unwrap_or_else(|| self.path.display().to_string());
        let mut msg = format!("Image generated and saved to {shown}");
        if !self.caption.trim().is_empty() {
            msg.push('\n');
            msg.push_str(self.caption.trim());
        }
        msg
    }
}

pub async fn generate_image(
    client: &dyn ModelClient,
    model: &str,
    prompt: &str,
    output_path: Option<&str>,
    root: Option<&Path>,
) -> Result<GeneratedImage, ActionError> {
    let response = client.generate(GenerateRequest::image(model, prompt)).await?;
    let caption = response.text();

    let Some(image) = response.first_image() else {
        return Err(ActionError::NoImage(caption));
    };

    let bytes = STANDARD
        .decode(image.data.trim())
        .map_err(|e| ActionError::NoImage(format!("Image payload is not valid base64: {e}")))?;

    let path = match output_path.filter(|p| !p.trim().is_empty()) {
        Some(p) => resolve_workspace_path(root, p)?,
        None => {
            let root = root.ok_or(ActionError::NoWorkspace)?;
            let millis = chrono::Utc::now().timestamp_millis();
            root.join(GENERATED_IMAGES_DIR)
                .join(format!("image_{millis}.{}", image.extension()))
        }
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ActionError::io(parent.display().to_string(), e))?;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ActionError::io(path.display().to_string(), e))?;

    Ok(GeneratedImage {
        path,
        bytes: bytes.len(),
        caption,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use strata_core::{InlineImage, ModelResponse, ProviderError, ResponsePart};

    struct FixedModel(ModelResponse);

    #[async_trait]
    impl ModelClient for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
            assert!(!request.modalities.is_empty());
            Ok(self.0.clone())
        }
    }

    fn png_response() -> ModelResponse {
        ModelResponse {
            parts: vec![
                ResponsePart::Text("A tiny logo.".into()),
                ResponsePart::Image(InlineImage {
                    mime_type: "image/png".into(),
                    data: STANDARD.encode(b"\x89PNG fake"),
                }),
            ],
        }
    }

    #[tokio::test]
    async fn saves_to_default_folder() {
        let dir = tempfile::tempdir().unwrap();
        let model = FixedModel(png_response());
        let image = generate_image(&model, "m", "logo", None, Some(dir.path()))
            .await
            .unwrap();
        assert!(image.path.starts_with(dir.path().join(GENERATED_IMAGES_DIR)));
        assert_eq!(image.path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&image.path).unwrap(), b"\x89PNG fake");

        let summary = image.summary(Some(dir.path()));
        assert!(summary.starts_with("Image generated and saved to ./generated-images/image_"));
        assert!(summary.ends_with("A tiny logo."));
    }

    #[tokio::test]
    async fn explicit_output_path_is_resolved_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let model = FixedModel(png_response());
        let image = generate_image(&model, "m", "logo", Some("public/logo.png"), Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(image.path, dir.path().join("public/logo.png"));
        assert!(image.path.exists());
    }

    #[tokio::test]
    async fn text_only_response_is_a_failure_with_explanation() {
        let model = FixedModel(ModelResponse::from_text("I can't draw that."));
        let err = generate_image(&model, "m", "logo", None, None).await.unwrap_err();
        assert!(matches!(err, ActionError::NoImage(_)));
        assert!(err.to_string().contains("I can't draw that."));
    }
}
