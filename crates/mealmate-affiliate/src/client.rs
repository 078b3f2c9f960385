//! The upstream client seam used by the proxy handlers.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

/// Default product count when the caller gives none.
pub const DEFAULT_LIMIT: u32 = 100;

/// Affiliate product API.
///
/// Implementations return the upstream payload as-is; callers forward it
/// verbatim.
#[async_trait]
pub trait AffiliateClient: Send + Sync {
    /// Best-selling products in a category.
    async fn best_category_products(&self, category_id: &str, limit: u32) -> Result<Value>;

    /// Keyword product search.
    async fn search_products(&self, keyword: &str, limit: u32) -> Result<Value>;

    /// Wrap a product URL in a tracked short link.
    async fn deeplink(&self, product_url: &str) -> Result<String>;
}
