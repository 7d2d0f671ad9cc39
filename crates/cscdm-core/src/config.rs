//! Configuration types for the zone edit dispatcher
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Domain Manager API base URL
pub const DEFAULT_API_URL: &str = "https://apis.cscglobal.com/dbs/api/v2/";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CscdmConfig {
    /// Backend API configuration
    pub api: ApiConfig,

    /// Batching and polling settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl CscdmConfig {
    /// Create a configuration with credentials and default settings
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(api_key, api_token),
            client: ClientConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.api.validate()?;
        self.client.validate()?;
        Ok(())
    }
}

/// Backend API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (sent as the `apikey` header)
    /// ⚠️ NEVER log this value
    pub api_key: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .field("api_token", &"<REDACTED>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApiConfig {
    /// Create an API configuration against the default endpoint
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            api_key: api_key.into(),
            api_token: api_token.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Validate the API configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::config("API key cannot be empty"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "API base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("API timeout must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

/// Batching and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Idle window after the last enqueue before the queue is flushed (in milliseconds)
    #[serde(default = "default_flush_idle_ms")]
    pub flush_idle_ms: u64,

    /// Interval between zone edit status polls and conflict retries (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on how long enqueues can keep postponing a flush (in milliseconds)
    ///
    /// Every enqueue re-arms the idle timer. Under continuous load this caps
    /// the delay between the first unflushed enqueue and its flush.
    #[serde(default = "default_max_flush_delay_ms")]
    pub max_flush_delay_ms: u64,

    /// Flush immediately once this many actions are queued
    ///
    /// `None` disables size-triggered flushes.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

impl ClientConfig {
    /// Validate the client settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.flush_idle_ms == 0 {
            return Err(crate::Error::config("Flush idle interval must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.max_flush_delay_ms < self.flush_idle_ms {
            return Err(crate::Error::config(format!(
                "Max flush delay ({}ms) cannot be shorter than the flush idle interval ({}ms)",
                self.max_flush_delay_ms, self.flush_idle_ms
            )));
        }
        if self.max_batch_size == Some(0) {
            return Err(crate::Error::config("Max batch size must be > 0 when set"));
        }
        Ok(())
    }

    pub fn flush_idle(&self) -> Duration {
        Duration::from_millis(self.flush_idle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_flush_delay(&self) -> Duration {
        Duration::from_millis(self.max_flush_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            flush_idle_ms: default_flush_idle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_flush_delay_ms: default_max_flush_delay_ms(),
            max_batch_size: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_flush_idle_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_flush_delay_ms() -> u64 {
    30_000
}
