//! Service configuration passed explicitly into adapter construction.

use crate::image::AspectRatio;

/// Default Gemini endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image (highest quality).
    ProImage,
}

impl ImageModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }
}

/// Gemini text model variants used for advice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdviceModel {
    /// Gemini 3 Flash preview.
    #[default]
    Flash,
    /// Gemini 2.5 Flash.
    FlashStable,
}

impl AdviceModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-3-flash-preview",
            Self::FlashStable => "gemini-2.5-flash",
        }
    }
}

/// Connection settings shared by the image and advice adapters.
#[derive(Clone)]
pub struct ServiceConfig {
    /// API key sent as `x-goog-api-key`. May be empty; the service will reject it.
    pub api_key: String,
    /// Endpoint root, without trailing slash.
    pub base_url: String,
    /// Model used for image generation and editing.
    pub image_model: ImageModel,
    /// Model used for advice.
    pub advice_model: AdviceModel,
    /// Aspect ratio requested for every image.
    pub aspect_ratio: AspectRatio,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<set>" })
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .field("advice_model", &self.advice_model)
            .field("aspect_ratio", &self.aspect_ratio)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: ImageModel::default(),
            advice_model: AdviceModel::default(),
            aspect_ratio: AspectRatio::Landscape,
        }
    }
}

impl ServiceConfig {
    /// Creates a config with the given key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Reads the config from the process environment.
    ///
    /// The key comes from `API_KEY`, then `GOOGLE_API_KEY`; a missing key
    /// becomes an empty string rather than an error. `AQUATICA_BASE_URL`
    /// overrides the endpoint root.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup("API_KEY")
            .filter(|k| !k.is_empty())
            .or_else(|| lookup("GOOGLE_API_KEY"))
            .unwrap_or_default();

        let mut config = Self::new(api_key);
        if let Some(url) = lookup("AQUATICA_BASE_URL").filter(|u| !u.is_empty()) {
            config = config.with_base_url(url);
        }
        config
    }

    /// Overrides the endpoint root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the image model.
    pub fn with_image_model(mut self, model: ImageModel) -> Self {
        self.image_model = model;
        self
    }

    /// Sets the advice model.
    pub fn with_advice_model(mut self, model: AdviceModel) -> Self {
        self.advice_model = model;
        self
    }

    /// Sets the aspect ratio requested for images.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Returns the `generateContent` URL for a model.
    pub(crate) fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Returns the resource URL for a model.
    pub(crate) fn model_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}", self.base_url, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.image_model.as_str(), "gemini-2.5-flash-image");
        assert_eq!(config.advice_model.as_str(), "gemini-3-flash-preview");
        assert_eq!(config.aspect_ratio, AspectRatio::Landscape);
    }

    #[test]
    fn test_missing_key_is_empty() {
        let config = ServiceConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_key, "");
    }

    #[test]
    fn test_api_key_preferred_over_google_key() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("API_KEY", "primary"),
            ("GOOGLE_API_KEY", "fallback"),
        ]));
        assert_eq!(config.api_key, "primary");

        let config = ServiceConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "fallback")]));
        assert_eq!(config.api_key, "fallback");
    }

    #[test]
    fn test_base_url_override_strips_slash() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("AQUATICA_BASE_URL", "http://localhost:8080/")]));
        assert_eq!(
            config.generate_url("m"),
            "http://localhost:8080/v1beta/models/m:generateContent"
        );
        assert_eq!(config.model_url("m"), "http://localhost:8080/v1beta/models/m");
    }

    #[test]
    fn test_model_overrides() {
        let config = ServiceConfig::new("key")
            .with_image_model(ImageModel::ProImage)
            .with_advice_model(AdviceModel::FlashStable);
        assert_eq!(config.image_model.as_str(), "gemini-3-pro-image-preview");
        assert_eq!(config.advice_model.as_str(), "gemini-2.5-flash");
        assert_eq!(
            config.generate_url(config.advice_model.as_str()),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let config = ServiceConfig::new("AIzaSecret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("AIzaSecret"));
        assert!(printed.contains("<set>"));
    }
}
