pub mod manager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
pub use manager::ConfigManager;

use crate::constants::{http, polling};
use crate::errors::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// REST root of the subscription service, e.g. `https://host/rest`
    pub base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_poll_interval_ms() -> u64 {
    polling::JOB_POLL_INTERVAL.as_millis() as u64
}

fn default_request_timeout() -> u64 {
    http::REQUEST_TIMEOUT.as_secs()
}

fn default_connect_timeout() -> u64 {
    http::CONNECT_TIMEOUT.as_secs()
}

impl ConsoleConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Check the loaded values and strip the trailing slash of `base_url`
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", trimmed),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        self.base_url = trimmed;
        Ok(self)
    }
}
