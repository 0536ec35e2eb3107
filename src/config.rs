//! SDK configuration
//!
//! All connection targets and identity credentials are supplied up front,
//! either programmatically or from a TOML file; nothing is persisted at
//! runtime. WiFi credentials are deliberately not part of the file format;
//! they are passed to `initialize` by the host application.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::topics::validate_identity;

/// Top-level SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SdkConfig {
    pub identity: IdentitySection,
    pub api: ApiSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub link: LinkSection,
}

/// Credentials identifying this device to the platform.
///
/// All three values are immutable for the SDK's lifetime and scope every
/// topic name and API request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentitySection {
    /// Project API token sent as `X-Project-Token`
    pub project_token: String,
    /// Sensor identifier (must match [a-zA-Z0-9._-]+)
    pub sensor_id: String,
    /// Project identifier (must match [a-zA-Z0-9._-]+)
    pub project_id: String,
}

/// Registration/ingest API endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSection {
    /// Base URL of the platform API, e.g. `http://localhost:3001/api`
    pub base_url: String,
}

/// MQTT broker endpoint and timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL with scheme and optional port, e.g. `mqtt://localhost:1883`
    pub url: String,
    /// How long to wait for the broker's ConnAck (default: 10s)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Heartbeat publish interval in milliseconds (default: 30000)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

/// Network link bring-up budget for `initialize`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    /// Status polls before giving up (default: 20)
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Delay between status polls in milliseconds (default: 500)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_poll_attempts() -> u32 {
    20
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: SdkConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate identity charset and endpoint URLs
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identity(&self.identity.sensor_id)
            .map_err(|e| ConfigError::InvalidConfig(format!("sensor_id: {e}")))?;
        validate_identity(&self.identity.project_id)
            .map_err(|e| ConfigError::InvalidConfig(format!("project_id: {e}")))?;

        if self.identity.project_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "project_token cannot be empty".to_string(),
            ));
        }

        url::Url::parse(&self.api.base_url)
            .map_err(|_| ConfigError::InvalidConfig(format!("api.base_url: {}", self.api.base_url)))?;
        url::Url::parse(&self.broker.url)
            .map_err(|_| ConfigError::InvalidConfig(format!("broker.url: {}", self.broker.url)))?;

        if self.link.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "link.max_poll_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.link.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.broker.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.connect_timeout_secs)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
