//! Configuration management module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Listener settings for the RR12 control connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_listen_ip")]
    pub listen_ip: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

/// RFID tag stream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_host")]
    pub host: String,
    #[serde(default = "default_source_port")]
    pub port: u16,
}

/// RR12 protocol identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol version reported during SETPROTOCOL negotiation.
    #[serde(default = "default_protocol_version")]
    pub version: f64,
    /// Box identifier reported in GETCONFIG replies.
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

/// Task pacing in milliseconds. Kept configurable so tests can run with
/// near-zero intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between operational-status log lines.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    /// Interval between payload pushes to the control session.
    #[serde(default = "default_forward_interval_ms")]
    pub forward_interval_ms: u64,
    /// First reconnect delay after a tag stream failure.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    /// Reconnect delay ceiling.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_listen_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    3601
}

fn default_source_host() -> String {
    "speedwayr-11-8e-a5".to_string()
}

fn default_source_port() -> u16 {
    14150
}

fn default_protocol_version() -> f64 {
    3.4
}

fn default_device_id() -> String {
    "T-21753".to_string()
}

fn default_status_interval_ms() -> u64 {
    10_000
}

fn default_forward_interval_ms() -> u64 {
    1_000
}

fn default_backoff_initial_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.listen_ip.trim().is_empty() {
            return Err(ConfigError::Validation("Listen IP cannot be empty".to_string()));
        }
        if self.control.listen_port == 0 {
            return Err(ConfigError::Validation(
                "Listen port must be greater than 0".to_string(),
            ));
        }
        if self.source.host.trim().is_empty() {
            return Err(ConfigError::Validation("Tag stream host cannot be empty".to_string()));
        }
        if self.source.port == 0 {
            return Err(ConfigError::Validation(
                "Tag stream port must be greater than 0".to_string(),
            ));
        }
        if self.protocol.version <= 0.0 {
            return Err(ConfigError::Validation(
                "Protocol version must be positive".to_string(),
            ));
        }
        if self.protocol.device_id.trim().is_empty() {
            return Err(ConfigError::Validation("Device ID cannot be empty".to_string()));
        }
        if self.timing.status_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Status interval must be at least 1 ms".to_string(),
            ));
        }
        if self.timing.forward_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Forward interval must be at least 1 ms".to_string(),
            ));
        }
        if self.timing.backoff_initial_ms == 0 {
            return Err(ConfigError::Validation(
                "Initial backoff must be at least 1 ms".to_string(),
            ));
        }
        if self.timing.backoff_max_ms < self.timing.backoff_initial_ms {
            return Err(ConfigError::Validation(
                "Backoff ceiling cannot be below the initial backoff".to_string(),
            ));
        }
        Ok(())
    }
}

impl TimingConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn forward_interval(&self) -> Duration {
        Duration::from_millis(self.forward_interval_ms)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            listen_ip: default_listen_ip(),
            listen_port: default_listen_port(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            port: default_source_port(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: default_protocol_version(),
            device_id: default_device_id(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            forward_interval_ms: default_forward_interval_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}
