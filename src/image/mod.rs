//! Image generation module.

mod gemini;
mod provider;
mod types;

pub use gemini::GeminiImageProvider;
pub use provider::ImageProvider;
pub use types::{
    underwater_style, AspectRatio, GeneratedImage, GenerationRequest, ImageData, ImageFormat,
};
