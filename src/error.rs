//! Error types for the remote Gemini services.

use std::time::Duration;

/// Maximum number of characters kept from a remote error body.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Coarse classification of a service failure.
///
/// Decided at the adapter boundary so callers never have to inspect
/// error messages to know how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service rejected the credential or the project/model it grants access to.
    Credential,
    /// Likely to succeed if the user tries again (network, rate limit, 5xx).
    Transient,
    /// Anything else: malformed responses, blocked content, bad requests.
    Unknown,
}

/// Errors that can occur while talking to the remote services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// API key missing, invalid, or not authorized for the requested entity.
    #[error("credential rejected: {0}")]
    Credential(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized error body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if any.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode image data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading an upload or saving an image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A success response whose body is not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background request task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Returns the structured classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Credential(_) => FailureKind::Credential,
            Self::RateLimited { .. } | Self::Network(_) => FailureKind::Transient,
            Self::Api { status, .. } if *status >= 500 => FailureKind::Transient,
            _ => FailureKind::Unknown,
        }
    }

    /// Returns true if the service rejected the credential.
    pub fn is_credential(&self) -> bool {
        self.kind() == FailureKind::Credential
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Redacts anything that looks like an API key and caps the length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-');
            if bare.starts_with("AIza") && bare.len() >= 30 {
                word.replace(bare, "[REDACTED]")
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}
