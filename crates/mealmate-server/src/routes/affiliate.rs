//! Affiliate product proxy.
//!
//! Each handler validates its input, calls the upstream client once, and
//! answers with the upstream payload verbatim. Validation failures never reach
//! upstream. Upstream errors and panics are normalized to a [`Failure`] and
//! logged before the `500` goes out.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use futures::FutureExt;
use mealmate_affiliate::{DEFAULT_LIMIT, is_affiliate_link};
use mealmate_core::errors::{Failure, FailureKind, panic_text};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use crate::response::ApiError;
use crate::server::AppState;

/// 400 body for a missing category.
pub const CATEGORY_REQUIRED: &str = "categoryId parameter is required";
/// 400 body for a missing search keyword.
pub const KEYWORD_REQUIRED: &str = "Keyword parameter is required";
/// 400 body for a missing deep-link target.
pub const PRODUCT_URL_REQUIRED: &str = "productUrl is required";

const FETCH_FAILED: &str = "Failed to fetch products";
const SEARCH_FAILED: &str = "Failed to search products";
const DEEPLINK_FAILED: &str = "Failed to generate deeplink";

type Params = Query<HashMap<String, String>>;

/// Body of `POST /api/coupang/deeplink`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeeplinkRequest {
    /// Product page to wrap.
    #[serde(default)]
    pub product_url: Option<String>,
}

/// `limit` query value; absent or unparseable falls back to [`DEFAULT_LIMIT`].
/// Parsed values are passed through without range checks.
pub fn parse_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(DEFAULT_LIMIT)
}

fn required<'a>(value: Option<&'a str>, missing: &'static str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(missing)),
    }
}

/// GET /api/coupang/categories/{categoryId}
#[instrument(skip_all, fields(category_id = %category_id))]
pub async fn category_by_path(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Query(params): Params,
) -> Result<Json<Value>, ApiError> {
    let category_id = required(Some(&category_id), CATEGORY_REQUIRED)?;
    let limit = parse_limit(params.get("limit").map(String::as_str));
    let products = call_upstream(
        "category",
        FETCH_FAILED,
        state.affiliate.best_category_products(category_id, limit),
    )
    .await?;
    Ok(Json(products))
}

/// GET /api/coupang/categories?categoryId=&limit=
#[instrument(skip_all)]
pub async fn category_by_query(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Value>, ApiError> {
    let category_id = required(params.get("categoryId").map(String::as_str), CATEGORY_REQUIRED)?;
    let limit = parse_limit(params.get("limit").map(String::as_str));
    let products = call_upstream(
        "category",
        FETCH_FAILED,
        state.affiliate.best_category_products(category_id, limit),
    )
    .await?;
    Ok(Json(products))
}

/// GET /api/coupang/search?keyword=&limit=
#[instrument(skip_all)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Value>, ApiError> {
    let keyword = required(params.get("keyword").map(String::as_str), KEYWORD_REQUIRED)?;
    let limit = parse_limit(params.get("limit").map(String::as_str));
    let products = call_upstream(
        "search",
        SEARCH_FAILED,
        state.affiliate.search_products(keyword, limit),
    )
    .await?;
    Ok(Json(products))
}

/// POST /api/coupang/deeplink
///
/// A body that does not parse is answered like a missing `productUrl`.
#[instrument(skip_all)]
pub async fn deeplink(
    State(state): State<AppState>,
    body: Result<Json<DeeplinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "unreadable deeplink body");
            DeeplinkRequest::default()
        }
    };
    let product_url = required(request.product_url.as_deref(), PRODUCT_URL_REQUIRED)?;

    if is_affiliate_link(product_url) {
        debug!("already an affiliate link, skipping upstream");
        return Ok(Json(json!({ "url": product_url })));
    }

    let url = call_upstream("deeplink", DEEPLINK_FAILED, state.affiliate.deeplink(product_url)).await?;
    Ok(Json(json!({ "url": url })))
}

/// Await one upstream call, turning errors and panics into a logged
/// [`ApiError::Upstream`].
async fn call_upstream<T, F>(route: &'static str, label: &'static str, call: F) -> Result<T, ApiError>
where
    F: Future<Output = mealmate_affiliate::Result<T>>,
{
    let failure = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => {
            let failure = Failure::from_error(FailureKind::Upstream, &e);
            error!(route, error = %e, kind = failure.kind.as_str(), "{label}");
            failure
        }
        Err(payload) => {
            let failure = Failure::from_panic(&*payload);
            error!(
                route,
                panic = panic_text(&*payload).unwrap_or("<non-string payload>"),
                kind = failure.kind.as_str(),
                "{label}"
            );
            failure
        }
    };
    Err(ApiError::Upstream { error: label, failure })
}
