//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::hub::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn to_api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
        }
    }
}

/// Connection hub tunables
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_max_connections() -> usize {
    10_000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_heartbeat_timeout() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    15
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            outbound_queue_capacity: default_queue_capacity(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl HubSettings {
    pub fn to_hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.max_connections,
            outbound_queue_capacity: self.outbound_queue_capacity.max(1),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
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
        Ok(config)
    }

    /// First existing config file in the default locations
    pub fn discover() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("booking-hub").join("config.toml")),
            Some(PathBuf::from("/etc/booking-hub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        config_paths.into_iter().flatten().find(|path| path.exists())
    }

    /// Load an explicit path, else a discovered file, else environment only
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(Self::discover);
        match path {
            Some(path) => Ok((Self::load_with_env(&path)?, Some(path))),
            None => Ok((Self::from_env(), None)),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(host) = std::env::var("BOOKING_HUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("BOOKING_HUB_PORT") {
            self.server.port = port;
        }

        // Hub overrides
        if let Some(max) = env_parse("BOOKING_HUB_MAX_CONNECTIONS") {
            self.hub.max_connections = max;
        }
        if let Some(timeout) = env_parse("BOOKING_HUB_HEARTBEAT_TIMEOUT_SECS") {
            self.hub.heartbeat_timeout_secs = timeout;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("BOOKING_HUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("BOOKING_HUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Booking Hub Configuration
#
# Environment variables override these settings:
# - BOOKING_HUB_HOST
# - BOOKING_HUB_PORT
# - BOOKING_HUB_MAX_CONNECTIONS
# - BOOKING_HUB_HEARTBEAT_TIMEOUT_SECS
# - BOOKING_HUB_LOG_LEVEL
# - BOOKING_HUB_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port (HTTP and /ws)
port = 8090

# Allowed CORS origins (empty = any)
cors_origins = []

[hub]
# Maximum concurrent connections
max_connections = 10000

# Frames buffered per connection before it is treated as stalled
outbound_queue_capacity = 256

# Evict connections silent for this long (seconds)
heartbeat_timeout_secs = 60

# How often to look for silent connections (seconds)
sweep_interval_secs = 15

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
