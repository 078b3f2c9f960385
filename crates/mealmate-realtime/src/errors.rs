//! Real-time client errors.

use thiserror::Error;

/// Errors surfaced by [`ConnectionManager::connect`](crate::ConnectionManager::connect).
///
/// Emission never returns these: a send while disconnected is a logged no-op.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The configured URL is not a valid WebSocket URL.
    #[error("invalid real-time URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// The session token cannot be carried in an HTTP header.
    #[error("session token contains characters not allowed in a header")]
    InvalidToken,
    /// The WebSocket handshake failed.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),
}

/// Result type for real-time operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
