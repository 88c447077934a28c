//! Gemini image generation and editing.

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::gemini::{
    self, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig,
    InlineData, RequestPart,
};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    decode_base64_lenient, GeneratedImage, GenerationRequest, ImageData, ImageFormat,
};
use async_trait::async_trait;
use std::time::Instant;

/// Image provider backed by a Gemini image model.
pub struct GeminiImageProvider {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl GeminiImageProvider {
    /// Creates a provider from an explicit configuration.
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Uses the given HTTP client instead of a fresh one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<Option<GeneratedImage>> {
        let start = Instant::now();
        let model = self.config.image_model.as_str();
        let body = build_request(request, &self.config);

        tracing::debug!(model, edit = request.is_edit(), "sending image request");
        let response = gemini::generate_content(&self.client, &self.config, model, &body).await?;

        let Some(inline) = extract_image(response) else {
            return Ok(None);
        };
        let image = decode_inline(inline)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(model, duration_ms, size = image.size(), "image received");

        Ok(Some(GeneratedImage {
            image,
            model: model.to_string(),
            duration_ms,
        }))
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedImage>> {
        self.generate_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        gemini::check_model(&self.client, &self.config, self.config.image_model.as_str()).await
    }
}

/// Builds the wire request.
///
/// Edits put the base image ahead of the verbatim prompt; creations send
/// only the styled prompt.
fn build_request(request: &GenerationRequest, config: &ServiceConfig) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(2);

    if let Some(ref base) = request.base_image {
        parts.push(RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: base.format().mime_type().to_string(),
                data: base.to_base64(),
            },
        });
    }

    parts.push(RequestPart::Text {
        text: request.model_prompt(),
    });

    GenerateContentRequest::new(parts).with_config(GenerationConfig {
        response_modalities: vec!["IMAGE".to_string()],
        image_config: Some(ImageConfig {
            aspect_ratio: config.aspect_ratio.as_str().to_string(),
        }),
    })
}

/// Picks the first image part, logging why there is none when the service says.
fn extract_image(response: GenerateContentResponse) -> Option<InlineData> {
    if let Some(reason) = response.block_message() {
        tracing::warn!(%reason, "image prompt blocked");
        return None;
    }
    let finish_reason = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.clone());

    let inline = response.first_inline_data();
    if inline.is_none() {
        tracing::debug!(?finish_reason, "response carried no image");
    }
    inline
}

fn decode_inline(inline: InlineData) -> Result<ImageData> {
    let bytes = decode_base64_lenient(&inline.data)?;
    if bytes.is_empty() {
        return Err(ServiceError::UnexpectedResponse(
            "empty image payload".into(),
        ));
    }
    let format = ImageFormat::from_magic_bytes(&bytes)
        .or_else(|| ImageFormat::from_mime_type(&inline.mime_type))
        .unwrap_or_default();
    Ok(ImageData::new(bytes, format))
}
