//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Trait for services that create or edit images.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Creates or edits an image.
    ///
    /// `Ok(None)` means the service answered but produced no image. That is
    /// not an error; callers keep their previous state.
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedImage>>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
