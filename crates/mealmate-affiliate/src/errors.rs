//! Affiliate API error types.

use thiserror::Error;

/// Errors from the upstream affiliate API client.
///
/// `Display` is the human-readable message surfaced to proxy callers.
#[derive(Debug, Error)]
pub enum AffiliateError {
    /// Access or secret key is not configured.
    #[error("affiliate API credentials are not configured")]
    MissingCredentials,
    /// The configured base URL cannot be used.
    #[error("invalid affiliate API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The base URL cannot have path segments (e.g. `mailto:`).
    #[error("affiliate API base URL cannot carry a path: {0}")]
    UnusableBaseUrl(String),
    /// Transport-level failure.
    #[error("affiliate API request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("affiliate API returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Upstream message or raw body.
        message: String,
    },
    /// The envelope carried a non-zero result code.
    #[error("{message}")]
    Api {
        /// Upstream `rCode`.
        code: String,
        /// Upstream `rMessage`.
        message: String,
    },
    /// The response body did not have the expected shape.
    #[error("unexpected affiliate API response: {0}")]
    InvalidResponse(String),
}

/// Result type for affiliate API operations.
pub type Result<T> = std::result::Result<T, AffiliateError>;
