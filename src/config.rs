//! Client configuration from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

/// Settings for talking to the chat backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL without a trailing slash
    pub api_url: String,
    pub request_timeout: Duration,
    /// `None` disables background health polling
    pub health_interval: Option<Duration>,
    /// Where previews and downloaded artifacts are written
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            health_interval: Some(Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS)),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset or empty variables take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("CHAT_API_URL") {
            let parsed = reqwest::Url::parse(url.trim()).map_err(|e| ConfigError::InvalidUrl {
                var: "CHAT_API_URL",
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl {
                    var: "CHAT_API_URL",
                    reason: format!("unsupported scheme {}", parsed.scheme()),
                });
            }
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(value) = get("CHAT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_secs("CHAT_REQUEST_TIMEOUT_SECS", &value)?);
        }

        if let Some(value) = get("CHAT_HEALTH_INTERVAL_SECS") {
            let secs = parse_secs("CHAT_HEALTH_INTERVAL_SECS", &value)?;
            config.health_interval = (secs > 0).then_some(Duration::from_secs(secs));
        }

        if let Some(dir) = get("CHAT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidSeconds {
        var,
        value: value.to_string(),
    })
}
