//! Affiliate-link detection.

/// Host of already-wrapped affiliate links.
pub const AFFILIATE_LINK_DOMAIN: &str = "link.coupang.com";

/// Whether `url` is already an affiliate link and must not be wrapped again.
pub fn is_affiliate_link(url: &str) -> bool {
    url.contains(AFFILIATE_LINK_DOMAIN)
}
