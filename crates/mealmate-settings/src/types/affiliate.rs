use serde::{Deserialize, Serialize};

/// Coupang Partners API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AffiliateSettings {
    /// API gateway origin.
    pub base_url: String,
    /// Partner access key.
    pub access_key: String,
    /// Partner secret key used for request signing.
    pub secret_key: String,
    /// Optional sub-channel ID attached to generated links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    /// TCP connect timeout for upstream calls, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl AffiliateSettings {
    /// Whether both keys are present.
    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl Default for AffiliateSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api-gateway.coupang.com".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            sub_id: None,
            connect_timeout_ms: 10_000,
        }
    }
}

impl std::fmt::Debug for AffiliateSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffiliateSettings")
            .field("base_url", &self.base_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("sub_id", &self.sub_id)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}
