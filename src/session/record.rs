//! Image records kept in the session history.

use crate::image::ImageData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prompt recorded for images the user uploaded instead of generating.
pub const UPLOAD_PROMPT: &str = "Uploaded Base Image";

/// Unique identifier of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// How an image entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    /// Produced by the image service.
    Generated,
    /// Supplied by the user as a base image.
    Uploaded,
}

/// One generated or uploaded image. Never modified after creation.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Unique identifier.
    pub id: ImageId,
    /// The image itself.
    pub image: ImageData,
    /// Prompt that produced the image, or [`UPLOAD_PROMPT`].
    pub prompt: String,
    /// Where the image came from.
    pub origin: ImageOrigin,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Creates a record stamped with a new id and the current time.
    pub fn new(image: ImageData, prompt: impl Into<String>) -> Self {
        Self {
            id: ImageId::new(),
            image,
            prompt: prompt.into(),
            origin: ImageOrigin::Generated,
            created_at: Utc::now(),
        }
    }

    /// Creates a record for a user-supplied base image.
    pub fn uploaded(image: ImageData) -> Self {
        Self {
            origin: ImageOrigin::Uploaded,
            ..Self::new(image, UPLOAD_PROMPT)
        }
    }

    /// Returns true if the user uploaded this image.
    pub fn is_upload(&self) -> bool {
        self.origin == ImageOrigin::Uploaded
    }

    /// Returns the image as a displayable data URL.
    pub fn data_url(&self) -> String {
        self.image.to_data_url()
    }
}
