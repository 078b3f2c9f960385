//! # mealmate-affiliate
//!
//! Upstream affiliate product API.
//!
//! - [`AffiliateClient`]: the seam the proxy handlers call through
//! - [`CoupangClient`]: `reqwest` implementation with HMAC request signing
//!   and `{rCode, rMessage, data}` envelope decoding
//! - [`is_affiliate_link`]: detects URLs that are already wrapped
//!
//! ## Crate Position
//!
//! Depends on mealmate-settings. Depended on by mealmate-server and the binary.

#![deny(unsafe_code)]

pub mod client;
pub mod coupang;
pub mod errors;
pub mod links;
pub mod signing;

pub use client::{AffiliateClient, DEFAULT_LIMIT};
pub use coupang::CoupangClient;
pub use errors::{AffiliateError, Result};
pub use links::{AFFILIATE_LINK_DOMAIN, is_affiliate_link};
