//! Environment-based configuration for the Holded API connection.
//!
//! Both binaries read the same three variables once at startup:
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `HOLDED_API_KEY` | yes | none |
//! | `HOLDED_BASE_URL` | no | `https://api.holded.com/api/invoicing/v1` |
//! | `HOLDED_TIMEOUT_SECONDS` | no | `20.0` |

use core::fmt;
use core::time::Duration;

use reqwest::header::HeaderValue;
use thiserror::Error;

/// Environment variable holding the Holded API key.
pub const API_KEY_VAR: &str = "HOLDED_API_KEY";
/// Environment variable overriding the API root.
pub const BASE_URL_VAR: &str = "HOLDED_BASE_URL";
/// Environment variable overriding the per-request timeout.
pub const TIMEOUT_VAR: &str = "HOLDED_TIMEOUT_SECONDS";

/// Production invoicing API root.
pub const DEFAULT_BASE_URL: &str = "https://api.holded.com/api/invoicing/v1";
/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 20.0_f64;

/// Configuration could not be built from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `HOLDED_API_KEY` is unset or blank.
    #[error("HOLDED_API_KEY environment variable is required")]
    MissingApiKey,
    /// `HOLDED_API_KEY` cannot be sent as an HTTP header value.
    #[error("HOLDED_API_KEY contains characters not allowed in a header")]
    InvalidApiKey,
    /// `HOLDED_TIMEOUT_SECONDS` is not a positive number of seconds.
    #[error("HOLDED_TIMEOUT_SECONDS must be a positive number of seconds, got '{value}'")]
    InvalidTimeout {
        /// The rejected raw value.
        value: String,
    },
}

/// Immutable connection settings shared by every invocation.
#[derive(Clone)]
pub struct Settings {
    /// Opaque API credential, sent as the `key` header.
    api_key: String,
    /// API root without a trailing slash.
    base_url: String,
    /// Per-request timeout.
    timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Settings {
    /// Builds settings from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] for a blank key,
    /// [`ConfigError::InvalidApiKey`] for a key that is not a valid header
    /// value and [`ConfigError::InvalidTimeout`] for a non-positive or
    /// non-finite timeout.
    pub fn new(api_key: &str, base_url: &str, timeout_seconds: f64) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if HeaderValue::from_str(api_key).is_err() {
            return Err(ConfigError::InvalidApiKey);
        }
        let timeout = Duration::try_from_secs_f64(timeout_seconds)
            .ok()
            .filter(|duration| !duration.is_zero())
            .ok_or_else(|| ConfigError::InvalidTimeout {
                value: timeout_seconds.to_string(),
            })?;
        Ok(Self {
            api_key: api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when the key is absent and
    /// [`ConfigError::InvalidTimeout`] when the timeout does not parse as a
    /// positive number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;
        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let timeout_seconds = match lookup(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_err| ConfigError::InvalidTimeout { value: raw.clone() })?,
            None => DEFAULT_TIMEOUT_SECONDS,
        };
        Self::new(&api_key, &base_url, timeout_seconds)
    }

    /// The API credential.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The API root, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect and debug formatting for readability"
)]
mod tests {
    use core::time::Duration;
    use std::collections::HashMap;

    use super::{ConfigError, DEFAULT_BASE_URL, Settings};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|&(name, value)| (name.to_owned(), value.to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let settings = Settings::from_lookup(lookup_from(&[("HOLDED_API_KEY", "secret")]))
            .expect("key alone should be enough");
        assert_eq!(settings.api_key(), "secret");
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
        assert_eq!(settings.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn missing_key_is_rejected() {
        let result = Settings::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn blank_key_is_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("HOLDED_API_KEY", "   ")]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn key_unusable_as_header_is_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("HOLDED_API_KEY", "abc\ndef")]));
        assert!(matches!(result, Err(ConfigError::InvalidApiKey)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("HOLDED_API_KEY", "secret"),
            ("HOLDED_BASE_URL", "http://localhost:9000/api/"),
        ]))
        .expect("valid settings");
        assert_eq!(settings.base_url(), "http://localhost:9000/api");
    }

    #[test]
    fn fractional_timeout_is_accepted() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("HOLDED_API_KEY", "secret"),
            ("HOLDED_TIMEOUT_SECONDS", "2.5"),
        ]))
        .expect("valid settings");
        assert_eq!(settings.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        for raw in ["abc", "0", "-3", "inf"] {
            let result = Settings::from_lookup(lookup_from(&[
                ("HOLDED_API_KEY", "secret"),
                ("HOLDED_TIMEOUT_SECONDS", raw),
            ]));
            assert!(
                matches!(result, Err(ConfigError::InvalidTimeout { .. })),
                "timeout '{raw}' should be rejected"
            );
        }
    }

    #[test]
    fn debug_output_hides_the_key() {
        let settings = Settings::new("top-secret", DEFAULT_BASE_URL, 1.0_f64).expect("valid");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("top-secret"));
    }
}
