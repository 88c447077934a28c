//! Gemini text model used for design advice.

use crate::advice::provider::{advice_prompt, resolve_advice, AdviceProvider};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::gemini::{self, GenerateContentRequest, RequestPart};
use async_trait::async_trait;

/// Advice provider backed by a Gemini text model.
pub struct GeminiAdviceProvider {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl GeminiAdviceProvider {
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

    /// Requests advice, surfacing errors and empty answers as-is.
    pub async fn request_advice(&self, context: &str) -> Result<Option<String>> {
        let model = self.config.advice_model.as_str();
        let body = GenerateContentRequest::new(vec![RequestPart::Text {
            text: advice_prompt(context),
        }]);

        tracing::debug!(model, "sending advice request");
        let response = gemini::generate_content(&self.client, &self.config, model, &body).await?;
        Ok(response.text())
    }

    /// Checks that the advice model is reachable with the configured key.
    pub async fn health_check(&self) -> Result<()> {
        gemini::check_model(&self.client, &self.config, self.config.advice_model.as_str()).await
    }
}

#[async_trait]
impl AdviceProvider for GeminiAdviceProvider {
    async fn fetch_advice(&self, context: &str) -> String {
        resolve_advice(self.request_advice(context).await)
    }
}
