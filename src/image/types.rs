//! Core types for image generation.

use crate::error::{Result, ServiceError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratios the image model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 21:9 ultrawide aspect ratio.
    #[serde(rename = "21:9")]
    Ultrawide,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::Ultrawide => "21:9",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable image bytes with their format.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("format", &self.format)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    /// Wraps bytes with a known format.
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// Wraps bytes, detecting the format from magic bytes.
    ///
    /// Fails with [`ServiceError::Decode`] when the bytes are not PNG, JPEG or WebP.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        let format = ImageFormat::from_magic_bytes(&bytes)
            .ok_or_else(|| ServiceError::Decode("unrecognized image format".into()))?;
        Ok(Self { bytes, format })
    }

    /// Parses a `data:<mime>;base64,<payload>` URI.
    ///
    /// Whitespace and missing padding in the payload are tolerated. The
    /// decoded bytes must still be a recognizable image.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let payload = match url.find(";base64,") {
            Some(pos) => &url[pos + 8..],
            None => {
                return Err(ServiceError::Decode(
                    "expected a base64 data URI".into(),
                ))
            }
        };
        let bytes = decode_base64_lenient(payload)?;
        Self::from_bytes(bytes)
    }

    /// Returns the raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the image format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Returns the image as a displayable data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Decodes base64 that may carry whitespace or lack padding.
pub(crate) fn decode_base64_lenient(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Wraps a bare prompt in the underwater house style used for new scenes.
pub fn underwater_style(prompt: &str) -> String {
    format!(
        "Underwater 3D environment: {prompt}. High quality, realistic caustics, \
         volumetric light shafts, deep ocean teal and blue palette, 8k resolution, \
         cinematic lighting."
    )
}

/// A request to create or edit an image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt as typed by the user.
    pub prompt: String,
    /// Image to edit. `None` means a fresh creation.
    pub base_image: Option<ImageData>,
}

impl GenerationRequest {
    /// Creates a new creation request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            base_image: None,
        }
    }

    /// Sets a base image, turning this into an edit request.
    pub fn with_base_image(mut self, image: ImageData) -> Self {
        self.base_image = Some(image);
        self
    }

    /// Returns true if this is an image editing request (has a base image).
    pub fn is_edit(&self) -> bool {
        self.base_image.is_some()
    }

    /// Returns the text actually sent to the model.
    ///
    /// Creations get the underwater style; edits send the prompt verbatim.
    pub fn model_prompt(&self) -> String {
        if self.is_edit() {
            self.prompt.clone()
        } else {
            underwater_style(&self.prompt)
        }
    }
}

/// An image returned by the service, with generation details.
#[derive(Debug, Clone)]
#[must_use = "generated image should be recorded or saved"]
pub struct GeneratedImage {
    /// The image itself.
    pub image: ImageData,
    /// Model that produced it.
    pub model: String,
    /// Round-trip duration in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] =
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello world!"), None);
        assert_eq!(ImageFormat::from_magic_bytes(&[0x89]), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/PNG"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_aspect_ratio_serializes_as_ratio() {
        assert_eq!(AspectRatio::Landscape.as_str(), "16:9");
        assert_eq!(
            serde_json::to_string(&AspectRatio::Landscape).unwrap(),
            "\"16:9\""
        );
    }

    #[test]
    fn test_data_url() {
        let image = ImageData::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = ImageData::from_data_url(&url).unwrap();
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_data_url_lenient_payload() {
        // JPEG magic, unpadded and wrapped across lines
        let url = "data:image/jpeg;base64,/9j/4AAAAAAA\nAAAAAA";
        let image = ImageData::from_data_url(url).unwrap();
        assert_eq!(image.format(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_from_bytes_rejects_non_images() {
        let err = ImageData::from_bytes(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));

        let err = ImageData::from_data_url("not a data url").unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }

    #[test]
    fn test_model_prompt_styles_creations_only() {
        let create = GenerationRequest::new("coral reef at dawn");
        assert!(!create.is_edit());
        assert_eq!(
            create.model_prompt(),
            "Underwater 3D environment: coral reef at dawn. High quality, realistic caustics, \
             volumetric light shafts, deep ocean teal and blue palette, 8k resolution, \
             cinematic lighting."
        );

        let base = ImageData::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        let edit = GenerationRequest::new("add jellyfish").with_base_image(base);
        assert!(edit.is_edit());
        assert_eq!(edit.model_prompt(), "add jellyfish");
    }
}
