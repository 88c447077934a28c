//! Gemini `generateContent` wire format and HTTP plumbing shared by the
//! image and advice adapters.

use crate::config::ServiceConfig;
use crate::error::{parse_retry_after, sanitize_error_message, Result, ServiceError};
use serde::{Deserialize, Serialize};

/// Sends a `generateContent` request and decodes the response.
pub(crate) async fn generate_content(
    client: &reqwest::Client,
    config: &ServiceConfig,
    model: &str,
    body: &GenerateContentRequest,
) -> Result<GenerateContentResponse> {
    let response = client
        .post(config.generate_url(model))
        .header("x-goog-api-key", &config.api_key)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        return Err(parse_error(status.as_u16(), &text, &headers));
    }

    let text = response.text().await?;
    parse_body(&text)
}

/// Decodes a success body.
pub(crate) fn parse_body(text: &str) -> Result<GenerateContentResponse> {
    Ok(serde_json::from_str(text)?)
}

/// Fetches the model resource to verify the key can see it.
pub(crate) async fn check_model(
    client: &reqwest::Client,
    config: &ServiceConfig,
    model: &str,
) -> Result<()> {
    let response = client
        .get(config.model_url(model))
        .header("x-goog-api-key", &config.api_key)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let headers = response.headers().clone();
    let text = response.text().await.unwrap_or_default();
    Err(parse_error(status.as_u16(), &text, &headers))
}

/// Maps a non-success response to a classified error.
///
/// Gemini reports a key that cannot reach the project or model as
/// `404 NOT_FOUND` ("Requested entity was not found"), so that is treated
/// as a credential failure alongside 401/403 and `API_KEY_INVALID`.
pub(crate) fn parse_error(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> ServiceError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(text).ok();
    let message = envelope
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| text.to_string());
    let message = sanitize_error_message(&message);

    let api_status = envelope.as_ref().and_then(|e| e.error.status.as_deref());
    let key_invalid = envelope.as_ref().is_some_and(|e| {
        e.error
            .details
            .iter()
            .any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"))
    });

    if status == 401
        || status == 403
        || status == 404
        || key_invalid
        || matches!(api_status, Some("NOT_FOUND" | "PERMISSION_DENIED" | "UNAUTHENTICATED"))
    {
        return ServiceError::Credential(message);
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return ServiceError::RateLimited { retry_after };
    }
    let lower = message.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return ServiceError::ContentBlocked(message);
    }
    ServiceError::Api { status, message }
}

// Request types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// A single-turn request with the given parts.
    pub fn new(parts: Vec<RequestPart>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    pub parts: Vec<RequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageConfig {
    pub aspect_ratio: String,
}

// Response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// First inline payload across all candidates and parts.
    pub fn first_inline_data(self) -> Option<InlineData> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
    }

    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// Block reason reported in `promptFeedback`, if the prompt was refused.
    pub fn block_message(&self) -> Option<String> {
        let feedback = self.prompt_feedback.as_ref()?;
        let reason = feedback.block_reason.as_ref()?;
        Some(
            feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {reason}")),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
