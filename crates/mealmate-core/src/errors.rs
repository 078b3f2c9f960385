//! Failure normalization.
//!
//! Handler boundaries catch failures of arbitrary shape: typed errors from
//! the upstream client, or panics unwinding out of it. Before anything is
//! rendered, every such failure is folded into a [`Failure`], which always
//! carries a usable message.

use std::any::Any;
use std::error::Error as StdError;

use serde::Serialize;

/// Message used when a failure does not carry a recognizable error.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

/// Broad classification of a caught failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The upstream service failed or returned something unusable.
    Upstream,
    /// Not a recognizable error value (e.g. a panic payload).
    Unknown,
}

impl FailureKind {
    /// Short classification string for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Unknown => "unknown",
        }
    }
}

/// A normalized `{kind, message}` failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Classification.
    pub kind: FailureKind,
    /// Human-readable message; never empty.
    pub message: String,
}

impl Failure {
    /// A failure with no recognizable error value.
    pub fn unknown() -> Self {
        Self {
            kind: FailureKind::Unknown,
            message: UNKNOWN_ERROR_MESSAGE.to_owned(),
        }
    }

    /// Normalize a typed error. An error that renders to an empty string is
    /// not a recognizable error and becomes [`Failure::unknown`].
    pub fn from_error<E: StdError + ?Sized>(kind: FailureKind, err: &E) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            return Self::unknown();
        }
        Self { kind, message }
    }

    /// Normalize a panic payload caught at a handler boundary.
    ///
    /// Panic payloads are never error values, so the message is always
    /// [`UNKNOWN_ERROR_MESSAGE`]. Use [`panic_text`] to log the payload.
    pub fn from_panic(_payload: &(dyn Any + Send)) -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

/// Best-effort text of a panic payload, for logging.
pub fn panic_text(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}
