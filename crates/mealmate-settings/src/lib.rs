//! # mealmate-settings
//!
//! Configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MealmateSettings::default()`]
//! 2. **Settings file**: `~/.mealmate/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MEALMATE_*` / `COUPANG_*` overrides (highest priority)
//!
//! Settings are loaded once by the binary and passed down explicitly.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = MealmateSettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.affiliate.base_url, "https://api-gateway.coupang.com");
        assert!(settings.affiliate.access_key.is_empty());
        assert_eq!(settings.realtime.url, "ws://127.0.0.1:3001/ws");
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }
}
