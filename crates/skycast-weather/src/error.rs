//! Weather-specific error types.

use thiserror::Error;

/// Raised by the retry client once every attempt has failed transiently.
#[derive(Debug, Error)]
pub enum TransientRequestError {
    #[error("HTTP {0} after retries")]
    Status(u16),

    #[error("Network error after retries: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors surfaced by the weather gateway.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Worth retrying later, or answering from the cache.
    #[error(transparent)]
    Transient(#[from] TransientRequestError),

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Provider returned HTTP {status}: {}", describe_status(*.status))]
    Http { status: u16 },

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("No API key configured")]
    MissingApiKey,

    #[error("HTTP client setup failed: {0}")]
    Setup(#[source] reqwest::Error),
}

impl WeatherError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Message for the terminal or chat surface.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Transient(_) => "Weather service is temporarily unavailable. Please try again later.",
            Self::NotFound(_) => "Could not resolve city.",
            Self::Http { .. } | Self::Decode(_) => "Sorry, the weather could not be retrieved.",
            Self::MissingApiKey => "Weather API key is missing. Set API_KEY.",
            Self::Setup(_) => "Could not start the weather client.",
        }
    }
}

/// Short diagnostic for a non-success provider status.
pub fn describe_status(status: u16) -> &'static str {
    match status {
        401 => "invalid API key",
        404 => "not found",
        429 => "rate limited",
        500..=599 => "server error",
        _ => "unexpected status",
    }
}

/// Failures inside the cache store. These never escape `CacheStore`;
/// they degrade to "no cached entry".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
