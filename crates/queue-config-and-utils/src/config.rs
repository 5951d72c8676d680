//! Configuration management for the request queue.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via REQUEST_QUEUE_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("REQUEST_QUEUE_API_URL") {
    Some(url) => url,
    None => "https://api.example.com",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request network timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default first backoff delay after a retryable failure.
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Default cap on the backoff delay.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Default number of retries before a request is failed.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Main queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Base URL requests are sent to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Network timeout for a single send.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// First backoff delay in milliseconds.
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Retries before a request is given up on.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bearer token for the API. Only ever read from the environment.
    #[serde(skip)]
    pub auth_token: Option<String>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_initial_retry_delay_ms() -> u64 {
    DEFAULT_INITIAL_RETRY_DELAY_MS
}

fn default_max_retry_delay_ms() -> u64 {
    DEFAULT_MAX_RETRY_DELAY_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            initial_retry_delay_ms: DEFAULT_INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            auth_token: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables take precedence over file values.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file. The auth token is never written.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(log_level) = env_value("REQUEST_QUEUE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = env_value("REQUEST_QUEUE_API_URL") {
            self.api_base_url = url;
        }
        if let Some(token) = env_value("REQUEST_QUEUE_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
    }

    /// Reject configurations the queue cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(CoreError::Config(format!(
                "initial_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.initial_retry_delay_ms, self.max_retry_delay_ms
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

fn env_value(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
