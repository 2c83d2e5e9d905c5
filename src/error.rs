//! # Error Types
//!
//! Every failure the pipeline can surface is a [`ResearchError`]. Errors from
//! the two HTTP clients are classified once into [`UpstreamError`] so callers
//! can tell an expired API key from a flaky network without string matching.

use reqwest::StatusCode;
use thiserror::Error;

/// Which external service produced an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    TextGeneration,
    WebSearch,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::TextGeneration => f.write_str("text generation"),
            Service::WebSearch => f.write_str("web search"),
        }
    }
}

/// Top-level error for a research run.
#[derive(Error, Debug)]
pub enum ResearchError {
    /// A required setting is missing or out of range.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generated text did not contain the expected `<tag>...</tag>` span.
    #[error("Parse error: expected <{tag}>...</{tag}> in generated text")]
    Parse { tag: String },

    /// Network or provider failure from one of the external clients.
    #[error("Upstream {service} error: {source}")]
    Upstream {
        service: Service,
        #[source]
        source: UpstreamError,
    },

    /// The initial research parameters were rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ResearchError {
    pub fn upstream(service: Service, source: UpstreamError) -> Self {
        ResearchError::Upstream { service, source }
    }

    pub fn parse(tag: impl Into<String>) -> Self {
        ResearchError::Parse { tag: tag.into() }
    }

    /// Short hint for the CLI to print under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ResearchError::Configuration(_) => {
                Some("Run `relearnweb settings set KEY=VALUE` or edit your .env file")
            }
            ResearchError::Upstream {
                source: UpstreamError::Unauthorized,
                ..
            } => Some("Check that the API key for this service is valid"),
            ResearchError::Upstream {
                source: UpstreamError::RateLimited,
                ..
            } => Some("The provider is rate limiting you; wait a moment and retry"),
            ResearchError::Parse { .. } => {
                Some("The model ignored the requested format; try again or use a stronger model")
            }
            _ => None,
        }
    }
}

/// Classified failure of an HTTP call to an external service.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The provider answered 200 but reported a failure in the body.
    #[error("Provider reported failure: {0}")]
    Provider(String),
}

impl UpstreamError {
    /// Map a non-success status and its body text.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => UpstreamError::Unauthorized,
            429 => UpstreamError::RateLimited,
            400 => UpstreamError::BadRequest(body),
            code @ 500..=599 => UpstreamError::ServerError(code, body),
            code => UpstreamError::HttpError(code, body),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Connection(e.to_string())
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}
