//! Request signing for the Coupang Partners gateway.
//!
//! ```text
//! Authorization: CEA algorithm=HmacSHA256, access-key=<ak>, signed-date=<yyMMddTHHmmssZ>, signature=<hex>
//! ```
//!
//! The signature is HMAC-SHA256 over `signed-date + method + path + query`
//! (query without the leading `?`), keyed by the secret key.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Gateway timestamp format, always UTC.
pub fn signed_date(now: DateTime<Utc>) -> String {
    now.format("%y%m%dT%H%M%SZ").to_string()
}

/// Hex HMAC-SHA256 signature of one request.
pub fn signature(secret: &str, signed_date: &str, method: &str, path: &str, query: &str) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(signed_date.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(query.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Full `Authorization` header value.
pub fn authorization(
    access_key: &str,
    secret_key: &str,
    method: &str,
    path: &str,
    query: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let date = signed_date(now);
    let sig = signature(secret_key, &date, method, path, query)?;
    Some(format!(
        "CEA algorithm=HmacSHA256, access-key={access_key}, signed-date={date}, signature={sig}"
    ))
}

/// Split an `Authorization` header back into `(access-key, signed-date, signature)`.
pub fn parse_authorization(header: &str) -> Option<(&str, &str, &str)> {
    let rest = header.strip_prefix("CEA algorithm=HmacSHA256, ")?;
    let mut access = None;
    let mut date = None;
    let mut sig = None;
    for part in rest.split(", ") {
        match part.split_once('=')? {
            ("access-key", v) => access = Some(v),
            ("signed-date", v) => date = Some(v),
            ("signature", v) => sig = Some(v),
            _ => {}
        }
    }
    Some((access?, date?, sig?))
}
