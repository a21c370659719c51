//! Sync session configuration.
//!
//! Everything is derived from one API base URL: the GraphQL endpoint lives at
//! `/graphql` and the realtime socket at `/ws` on the same host, with the
//! scheme switched to `ws://` or `wss://`. Each value can be overridden via
//! `ISSUEBOARD_*` environment variables.

use std::time::Duration;

use crate::net::ReconnectPolicy;
use crate::net::backoff::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The base URL is not `http://` or `https://`.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: String,
    pub ws_url: String,
    pub graphql_url: String,
    pub access_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    /// Interval between `ping` probes while the socket is open. `None`
    /// disables the heartbeat.
    pub heartbeat: Option<Duration>,
}

impl SyncConfig {
    /// Config for `api_url` with default reconnect policy and no heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the scheme is neither
    /// `http` nor `https`.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = api_url.trim_end_matches('/').to_owned();
        Ok(Self {
            ws_url: ws_url(&api_url)?,
            graphql_url: format!("{api_url}/graphql"),
            api_url,
            access_token: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat: None,
        })
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when `ISSUEBOARD_API_URL` is
    /// not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("ISSUEBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let mut config = Self::new(&api_url)?;
        if let Some(ws) = get("ISSUEBOARD_WS_URL") {
            config.ws_url = ws;
        }
        if let Some(graphql) = get("ISSUEBOARD_GRAPHQL_URL") {
            config.graphql_url = graphql;
        }
        config.access_token = get("ISSUEBOARD_ACCESS_TOKEN");

        let base_ms = env_parse(&get, "ISSUEBOARD_RECONNECT_BASE_MS", millis(DEFAULT_RECONNECT_BASE_DELAY));
        let timeout_ms = env_parse(&get, "ISSUEBOARD_CONNECT_TIMEOUT_MS", millis(DEFAULT_CONNECT_TIMEOUT));
        config.reconnect = ReconnectPolicy {
            max_attempts: env_parse(&get, "ISSUEBOARD_RECONNECT_MAX", DEFAULT_MAX_RECONNECT_ATTEMPTS),
            base_delay: Duration::from_millis(base_ms),
            connect_timeout: Duration::from_millis(timeout_ms),
        };

        let heartbeat_secs: u64 = env_parse(&get, "ISSUEBOARD_HEARTBEAT_SECS", 0);
        config.heartbeat = (heartbeat_secs > 0).then(|| Duration::from_secs(heartbeat_secs));
        Ok(config)
    }
}

/// Realtime socket URL for an API base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for any scheme other than
/// `http` or `https`.
pub fn ws_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim_end_matches('/');

    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }

    Err(ConfigError::InvalidBaseUrl(base_url.to_owned()))
}

fn env_parse<T>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    get(key).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
