//! Client configuration.
//!
//! Plain data with explicit parsing; binaries load it from the environment,
//! tests and libraries construct it directly. The base URL doubles as the
//! source of the websocket endpoint so the two transports cannot drift to
//! different hosts.

use std::time::Duration;

/// Environment variable naming the API base URL.
pub const ENV_BASE_URL: &str = "CREWDECK_BASE_URL";

/// Environment variable overriding the history page size.
pub const ENV_PAGE_SIZE: &str = "CREWDECK_PAGE_SIZE";

/// Environment variable overriding the handshake timeout (milliseconds).
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "CREWDECK_HANDSHAKE_TIMEOUT_MS";

/// Error returned when configuration values cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Base URL is not `http://` or `https://`.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// Page size is not a positive integer.
    #[error("invalid page size: {0}")]
    InvalidPageSize(String),
    /// Handshake timeout is not a positive millisecond count.
    #[error("invalid handshake timeout: {0}")]
    InvalidTimeout(String),
}

/// Settings for one chat client instance.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// HTTP(S) base URL of the Crewdeck API, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Number of messages per history page.
    pub page_size: u32,
    /// Upper bound on the connect/authenticate handshake.
    pub handshake_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            page_size: 20,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl ChatConfig {
    /// Build a config from process environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a present value fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            config.page_size = raw
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidPageSize(raw))?;
        }
        if let Some(raw) = lookup(ENV_HANDSHAKE_TIMEOUT_MS) {
            let millis = raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?;
            config.handshake_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Websocket endpoint derived from the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for non-HTTP schemes.
    pub fn ws_url(&self) -> Result<String, ConfigError> {
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("http://") {
            return Ok(format!("ws://{rest}/ws"));
        }
        if let Some(rest) = base.strip_prefix("https://") {
            return Ok(format!("wss://{rest}/ws"));
        }
        Err(ConfigError::InvalidBaseUrl(self.base_url.clone()))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
