//! Configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

// =============================================================================
// AUTH MANAGER
// =============================================================================

/// Timing knobs for the auth manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Upper bound on a single session probe or role lookup.
    pub lookup_timeout: Duration,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
}

impl AuthConfig {
    /// Optional:
    /// - `AUTH_LOOKUP_TIMEOUT_MS`: default 10000
    /// - `AUTH_REFRESH_INTERVAL_SECS`: default 3600
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lookup_timeout: Duration::from_millis(env_parse("AUTH_LOOKUP_TIMEOUT_MS", DEFAULT_LOOKUP_TIMEOUT_MS)),
            refresh_interval: Duration::from_secs(env_parse(
                "AUTH_REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

// =============================================================================
// BACKEND PLATFORM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Endpoint and public key of the hosted backend.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Base URL without a trailing slash.
    pub url: String,
    pub anon_key: String,
    pub timeouts: HttpTimeouts,
}

impl PlatformConfig {
    /// Required:
    /// - `BACKEND_URL`
    /// - `BACKEND_ANON_KEY`
    ///
    /// Optional:
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the URL is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("BACKEND_URL").map_err(|_| ConfigError::MissingVar("BACKEND_URL"))?;
        let anon_key = std::env::var("BACKEND_ANON_KEY").map_err(|_| ConfigError::MissingVar("BACKEND_ANON_KEY"))?;
        let timeouts = HttpTimeouts {
            request_secs: env_parse("BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self::new(&url, anon_key, timeouts)
    }

    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or the key is blank.
    pub fn new(url: &str, anon_key: String, timeouts: HttpTimeouts) -> Result<Self, ConfigError> {
        let url = normalize_url(url)?;
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Invalid { var: "BACKEND_ANON_KEY", reason: "empty".into() });
        }
        Ok(Self { url, anon_key, timeouts })
    }
}

// Key stays out of logs.
impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { var: "BACKEND_URL", reason };
    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(format!("{e}: {raw}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid(format!("not an http(s) URL: {parsed}")));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid(format!("unexpected query or fragment: {parsed}")));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
