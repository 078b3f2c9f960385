//! JSON error responses.
//!
//! Every handler path ends in JSON: `400 {error}` for caller mistakes,
//! `500 {error, message}` for upstream or unknown failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mealmate_core::errors::Failure;
use serde_json::json;
use thiserror::Error;

/// Error rendered by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input; nothing upstream was called.
    #[error("{0}")]
    BadRequest(&'static str),
    /// The upstream call failed.
    #[error("{error}: {failure}")]
    Upstream {
        /// Fixed per-route label.
        error: &'static str,
        /// Normalized cause.
        failure: Failure,
    },
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest(error) => json!({ "error": error }),
            Self::Upstream { error, failure } => json!({ "error": error, "message": failure.message }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use mealmate_core::errors::UNKNOWN_ERROR_MESSAGE;

    use super::*;

    async fn body_of(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_request_has_only_error() {
        let resp = ApiError::BadRequest("Keyword parameter is required").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(resp).await, json!({"error": "Keyword parameter is required"}));
    }

    #[tokio::test]
    async fn upstream_has_error_and_message() {
        let resp = ApiError::Upstream {
            error: "Failed to search products",
            failure: Failure::unknown(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(resp).await,
            json!({"error": "Failed to search products", "message": UNKNOWN_ERROR_MESSAGE})
        );
    }

    #[test]
    fn display_for_logs() {
        let err = ApiError::Upstream {
            error: "Failed to fetch products",
            failure: Failure::unknown(),
        };
        assert_eq!(
            err.to_string(),
            format!("Failed to fetch products: [unknown] {UNKNOWN_ERROR_MESSAGE}")
        );
    }
}
