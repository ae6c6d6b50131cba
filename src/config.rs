//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::time::{is_valid_timestamp_format, parse_utc_offset, TimeRange, TimeResolver};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Range start used when the URL carries none
    #[serde(default = "default_from")]
    pub default_from: String,

    /// Range end used when the URL carries none
    #[serde(default = "default_to")]
    pub default_to: String,

    /// strftime format of the `from`/`to` parameters sent to the backend
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Offset naive timestamps and rounding are evaluated in
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Capacity of the store event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_from() -> String {
    "now-1h".to_string()
}

fn default_to() -> String {
    "now".to_string()
}

fn default_timestamp_format() -> String {
    crate::time::DEFAULT_TIMESTAMP_FORMAT.to_string()
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_from: default_from(),
            default_to: default_to(),
            timestamp_format: default_timestamp_format(),
            utc_offset: default_utc_offset(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl StoreConfig {
    /// Range used when the URL does not carry one
    pub fn default_range(&self) -> TimeRange {
        TimeRange::new(&self.default_from, &self.default_to)
    }

    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset).ok_or_else(|| ConfigError::Invalid {
            field: "store.utc_offset".to_string(),
            error: format!("'{}' is not an offset like +02:00", self.utc_offset),
        })
    }

    pub fn resolver(&self) -> Result<TimeResolver, ConfigError> {
        Ok(TimeResolver::new(self.offset()?))
    }

    /// Check every field that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolver = self.resolver()?;

        self.default_range()
            .validate(&resolver)
            .map_err(|e| ConfigError::Invalid {
                field: "store.default_from/default_to".to_string(),
                error: e.to_string(),
            })?;

        if !is_valid_timestamp_format(&self.timestamp_format) {
            return Err(ConfigError::Invalid {
                field: "store.timestamp_format".to_string(),
                error: format!("'{}' is not a valid strftime format", self.timestamp_format),
            });
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "store.event_capacity".to_string(),
                error: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Backend HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Base URL relative data-source URLs are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Path of the collector reload endpoint
    #[serde(default = "default_reload_path")]
    pub reload_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_reload_path() -> String {
    "/reload_collector/".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            reload_path: default_reload_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.store.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.store.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("dashboard-store").join("config.toml")),
            Some(PathBuf::from("/etc/dashboard-store/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Store overrides
        if let Ok(from) = std::env::var("DASHBOARD_DEFAULT_FROM") {
            self.store.default_from = from;
        }
        if let Ok(to) = std::env::var("DASHBOARD_DEFAULT_TO") {
            self.store.default_to = to;
        }
        if let Ok(offset) = std::env::var("DASHBOARD_UTC_OFFSET") {
            self.store.utc_offset = offset;
        }

        // HTTP overrides
        if let Ok(url) = std::env::var("DASHBOARD_BASE_URL") {
            self.http.base_url = url;
        }
        if let Ok(timeout) = std::env::var("DASHBOARD_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.http.request_timeout_secs = secs;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("DASHBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DASHBOARD_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Dashboard Store Configuration
#
# Environment variables override these settings:
# - DASHBOARD_DEFAULT_FROM
# - DASHBOARD_DEFAULT_TO
# - DASHBOARD_UTC_OFFSET
# - DASHBOARD_BASE_URL
# - DASHBOARD_REQUEST_TIMEOUT
# - DASHBOARD_LOG_LEVEL
# - DASHBOARD_LOG_FORMAT

[store]
# Time range used when the URL carries no from/to
default_from = "now-1h"
default_to = "now"

# Format of the from/to parameters sent to every data source
timestamp_format = "%Y-%m-%d %H:%M:%S%z"

# Offset used for naive timestamps and day/week rounding
utc_offset = "+00:00"

# Capacity of the store event channel
event_capacity = 256

[http]
# Relative data-source URLs are joined onto this base
base_url = "http://localhost:8888"

# Request timeout in seconds
request_timeout_secs = 30

# Collector reload endpoint
reload_path = "/reload_collector/"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
