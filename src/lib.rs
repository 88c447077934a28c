#![warn(missing_docs)]
//! Aquatica - underwater 3D environment design with Gemini.
//!
//! This crate drives an interactive design session: prompts become scenes
//! via a Gemini image model, each new scene becomes the base for the next
//! edit, and a Gemini text model offers technical advice on the latest idea.
//!
//! # Quick Start
//!
//! ```no_run
//! use aquatica::{ServiceConfig, Session};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> aquatica::Result<()> {
//!     let mut session = Session::from_config(ServiceConfig::from_env());
//!
//!     session.submit_prompt("coral reef at dawn");
//!     session.settle().await;
//!
//!     if let Some(scene) = session.active_image() {
//!         scene.image.save("reef.png")?;
//!     }
//!     println!("{}", session.advice_text());
//!     Ok(())
//! }
//! ```
//!
//! # Using the adapters directly
//!
//! ```no_run
//! use aquatica::{GeminiImageProvider, GenerationRequest, ImageProvider, ServiceConfig};
//!
//! # async fn run() -> aquatica::Result<()> {
//! let provider = GeminiImageProvider::new(ServiceConfig::from_env());
//! let request = GenerationRequest::new("sunken galleon in a kelp forest");
//! if let Some(generated) = provider.generate(&request).await? {
//!     generated.image.save("galleon.png")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `aquatica` terminal studio.

pub mod advice;
mod config;
mod error;
mod gemini;
pub mod image;
pub mod session;

pub use config::{AdviceModel, ImageModel, ServiceConfig, DEFAULT_BASE_URL};
pub use error::{FailureKind, Result, ServiceError};

pub use advice::{AdviceProvider, GeminiAdviceProvider};
pub use image::{
    AspectRatio, GeminiImageProvider, GeneratedImage, GenerationRequest, ImageData, ImageFormat,
    ImageProvider,
};
pub use session::{ImageId, ImageOrigin, ImageRecord, Session, SessionEvent};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::advice::AdviceProvider;
    pub use crate::config::ServiceConfig;
    pub use crate::error::{FailureKind, Result, ServiceError};
    pub use crate::image::{GenerationRequest, ImageData, ImageProvider};
    pub use crate::session::{ImageId, ImageRecord, Session};
}
