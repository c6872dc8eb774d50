//! Pipeline configuration
//!
//! Configuration comes from three layers, later ones winning:
//! built-in defaults, an optional JSON file, and `NEWS_*` / `KAFKA_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`Config`]
    #[error("failed to parse config JSON from '{path}': {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("{0}")]
    Invalid(String),

    /// A config file contained an invalid value
    #[error("invalid configuration in '{path}': {message}")]
    InvalidFile {
        /// File path
        path: PathBuf,
        /// Validation message
        message: String,
    },

    /// Config file could not be written
    #[error("failed to write config to file '{path}': {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config could not be encoded
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Results per page used when the request does not choose one, 1..=100
    pub max_page_size: u32,
    /// Search endpoint URL
    pub base_url: String,
    /// Fallback wait after a 429 without a usable reset time
    pub default_rate_limit_delay_seconds: u64,
    /// Broker bootstrap address
    pub kafka_broker: String,
    /// Topic receiving artifact paths
    pub kafka_topic: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Retry budget (carried for compatibility; pages are not retried on failure)
    pub max_retries: u32,
    /// Root directory for artifacts
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_page_size: 20,
            base_url: "https://newsapi.org/v2/top-headlines".to_string(),
            default_rate_limit_delay_seconds: 60,
            kafka_broker: "localhost:9092".to_string(),
            kafka_topic: "news_files".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            output_dir: PathBuf::from("/tmp/news_downloads"),
        }
    }
}

impl Config {
    /// Load a JSON config file over the defaults and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(|e| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overlay values from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`
    ///
    /// Empty, unparseable or out-of-range values leave the current value in
    /// place.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(size) = get("NEWS_MAX_PAGE_SIZE").and_then(|v| v.parse::<u32>().ok()) {
            if (1..=100).contains(&size) {
                self.max_page_size = size;
            }
        }
        if let Some(url) = get("NEWS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(delay) = get("NEWS_RATE_LIMIT_DELAY").and_then(|v| v.parse::<u64>().ok()) {
            if delay > 0 {
                self.default_rate_limit_delay_seconds = delay;
            }
        }
        if let Some(broker) = get("KAFKA_BROKER") {
            self.kafka_broker = broker;
        }
        if let Some(topic) = get("KAFKA_TOPIC") {
            self.kafka_topic = topic;
        }
        if let Some(timeout) = get("NEWS_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            if timeout > 0 {
                self.timeout_seconds = timeout;
            }
        }
        if let Some(retries) = get("NEWS_MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            self.max_retries = retries;
        }
        if let Some(dir) = get("NEWS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 || self.max_page_size > 100 {
            return Err(ConfigError::Invalid(format!(
                "max_page_size must be between 1 and 100, got {}",
                self.max_page_size
            )));
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::Invalid("base_url cannot be empty".to_string()));
        }
        if self.kafka_broker.is_empty() {
            return Err(ConfigError::Invalid("kafka_broker cannot be empty".to_string()));
        }
        if self.kafka_topic.is_empty() {
            return Err(ConfigError::Invalid("kafka_topic cannot be empty".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(format!(
                "timeout_seconds must be positive, got {}",
                self.timeout_seconds
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Write the config as pretty JSON, refusing invalid values
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.validate()
            .map_err(|e| ConfigError::Invalid(format!("cannot save invalid config: {e}")))?;

        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Fallback wait after a 429
    pub fn default_rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.default_rate_limit_delay_seconds)
    }
}
