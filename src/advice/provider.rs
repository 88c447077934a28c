//! Advice provider trait and fallback texts.

use crate::error::Result;
use async_trait::async_trait;

/// Shown when the service answered with no text.
pub const NO_ADVICE: &str = "No advice available at this time.";

/// Shown when the advice request failed.
pub const ADVICE_FAILED: &str = "Failed to fetch technical design advice.";

/// Trait for services that produce design advice.
///
/// Advice never fails from the caller's point of view: implementations
/// downgrade every problem to one of the fixed placeholder texts.
#[async_trait]
pub trait AdviceProvider: Send + Sync {
    /// Returns advice about the given context. Never empty.
    async fn fetch_advice(&self, context: &str) -> String;
}

/// Builds the prompt sent to the text model.
pub fn advice_prompt(context: &str) -> String {
    format!(
        "You are an expert 3D Graphic Designer. Provide specific technical guidance for \
         underwater web backgrounds regarding: {context}. Keep it professional, concise, \
         and focused on web optimization (Three.js/WebGL)."
    )
}

/// Collapses a raw service outcome into displayable advice.
pub fn resolve_advice(outcome: Result<Option<String>>) -> String {
    match outcome {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => NO_ADVICE.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "advice request failed");
            ADVICE_FAILED.to_string()
        }
    }
}
