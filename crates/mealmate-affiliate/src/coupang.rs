//! Coupang Partners gateway client backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mealmate_settings::AffiliateSettings;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::AffiliateClient;
use crate::errors::{AffiliateError, Result};
use crate::signing;

const API_ROOT: &str = "/v2/providers/affiliate_open_api/apis/openapi";

/// Gateway response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "rCode", default)]
    r_code: Value,
    #[serde(rename = "rMessage", default)]
    r_message: String,
    #[serde(default)]
    data: Value,
}

/// Client for the Coupang Partners open API.
pub struct CoupangClient {
    http: reqwest::Client,
    base_url: Url,
    access_key: String,
    secret_key: String,
    sub_id: Option<String>,
}

impl CoupangClient {
    /// Build a client from settings.
    pub fn new(settings: &AffiliateSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .user_agent(concat!("mealmate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AffiliateError::UnusableBaseUrl(settings.base_url.clone()));
        }
        Ok(Self {
            http,
            base_url,
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
            sub_id: settings.sub_id.clone(),
        })
    }

    /// API path appended to whatever path prefix the base URL carries.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| AffiliateError::UnusableBaseUrl(self.base_url.to_string()))?;
            let _ = path.pop_if_empty();
            for segment in API_ROOT.split('/').filter(|s| !s.is_empty()) {
                let _ = path.push(segment);
            }
            for segment in segments {
                let _ = path.push(segment);
            }
        }
        if query.is_empty() {
            url.set_query(None);
        } else {
            let _ = url.query_pairs_mut().clear().extend_pairs(query);
        }
        Ok(url)
    }

    async fn call(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(AffiliateError::MissingCredentials);
        }

        let authorization = signing::authorization(
            &self.access_key,
            &self.secret_key,
            method.as_str(),
            url.path(),
            url.query().unwrap_or(""),
            Utc::now(),
        )
        .ok_or_else(|| AffiliateError::InvalidResponse("cannot sign request".into()))?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(reqwest::header::AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path = url.path(), status = status.as_u16(), "affiliate API response");

        if !status.is_success() {
            let message = upstream_message(&text);
            warn!(%method, path = url.path(), status = status.as_u16(), %message, "affiliate API error status");
            return Err(AffiliateError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| AffiliateError::InvalidResponse(e.to_string()))?;
        let code = match &envelope.r_code {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        if code != "0" {
            warn!(code = %code, message = %envelope.r_message, "affiliate API rejected request");
            return Err(AffiliateError::Api {
                code,
                message: envelope.r_message,
            });
        }
        Ok(envelope.data)
    }

    fn with_sub_id<'a>(&'a self, mut query: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        if let Some(sub_id) = &self.sub_id {
            query.push(("subId", sub_id.as_str()));
        }
        query
    }
}

impl std::fmt::Debug for CoupangClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoupangClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_key", &self.access_key)
            .field("sub_id", &self.sub_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AffiliateClient for CoupangClient {
    #[instrument(skip(self))]
    async fn best_category_products(&self, category_id: &str, limit: u32) -> Result<Value> {
        let limit = limit.to_string();
        let query = self.with_sub_id(vec![("limit", limit.as_str())]);
        let url = self.endpoint(&["products", "bestcategories", category_id], &query)?;
        self.call(Method::GET, url, None).await
    }

    #[instrument(skip(self))]
    async fn search_products(&self, keyword: &str, limit: u32) -> Result<Value> {
        let limit = limit.to_string();
        let query = self.with_sub_id(vec![("keyword", keyword), ("limit", limit.as_str())]);
        let url = self.endpoint(&["products", "search"], &query)?;
        self.call(Method::GET, url, None).await
    }

    #[instrument(skip(self))]
    async fn deeplink(&self, product_url: &str) -> Result<String> {
        let url = self.endpoint(&["v1", "deeplink"], &[])?;
        let mut body = json!({ "coupangUrls": [product_url] });
        if let Some(sub_id) = &self.sub_id {
            body["subId"] = json!(sub_id);
        }
        let data = self.call(Method::POST, url, Some(body)).await?;
        data.get(0)
            .and_then(|entry| entry.get("shortenUrl"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AffiliateError::InvalidResponse("deeplink response has no shortenUrl".into()))
    }
}

/// Best human-readable message from an error body.
fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["rMessage", "message"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str).filter(|m| !m.is_empty()) {
                return msg.to_owned();
            }
        }
    }
    body.trim().to_owned()
}
