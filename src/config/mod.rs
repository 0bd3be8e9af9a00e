//! # Configuration Management Module
//!
//! Every value has a default equal to the bridge's fixed operating constants, so the
//! service runs with no configuration file at all. A TOML file can override them.
//!
//! ## Configuration Structure
//!
//! - [`SerialConfig`] - device path, baud rate, read timeout, reconnect backoff
//! - [`NetworkConfig`] - network manager program and how it is invoked
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! read_timeout_ms = 1000
//! reconnect_delay_ms = 2000
//! poll_interval_ms = 100
//! # max_open_attempts = 10   # unset = retry forever
//!
//! [network]
//! program = "nmcli"
//! use_sudo = true
//! command_timeout_secs = 60
//!
//! [logging]
//! level = "debug"
//! # file = "credbridge.log"
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use credbridge::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("credbridge.toml").await?;
//!     println!("Serial Port: {}", config.serial.port);
//!     Ok(())
//! }
//! ```

use crate::listener::ListenerTiming;
use crate::network::NmcliConfigurator;
use crate::serial::{RetryPolicy, SerialSettings};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Delay between open attempts and after losing the device.
    pub reconnect_delay_ms: u64,
    /// Sleep between polls when no input is waiting.
    pub poll_interval_ms: u64,
    /// Give up after this many failed opens. Unset retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_open_attempts: Option<u32>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 1000,
            reconnect_delay_ms: 2000,
            poll_interval_ms: 100,
            max_open_attempts: None,
        }
    }
}

impl SerialConfig {
    pub fn settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.reconnect_delay_ms),
            max_attempts: self.max_open_attempts,
        }
    }

    pub fn timing(&self) -> ListenerTiming {
        ListenerTiming {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// NetworkManager CLI binary.
    pub program: String,
    /// Prefix every call with `sudo`.
    pub use_sudo: bool,
    /// Kill the tool if it runs longer than this (0 disables the limit).
    pub command_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            program: "nmcli".to_string(),
            use_sudo: true,
            command_timeout_secs: 60,
        }
    }
}

impl NetworkConfig {
    pub fn configurator(&self) -> NmcliConfigurator {
        let limit = match self.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        NmcliConfigurator::new(self.program.clone(), self.use_sudo, limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.level
            .parse::<log::LevelFilter>()
            .map_err(|_| anyhow!("Unknown log level '{}'", self.level))
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(Path::new(path)).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Config::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            bail!("serial.port must not be empty");
        }
        if self.serial.baud_rate == 0 {
            bail!("serial.baud_rate must be greater than zero");
        }
        if self.serial.read_timeout_ms == 0 {
            bail!("serial.read_timeout_ms must be greater than zero");
        }
        if self.serial.max_open_attempts == Some(0) {
            bail!("serial.max_open_attempts must be at least 1 when set");
        }
        if self.network.program.trim().is_empty() {
            bail!("network.program must not be empty");
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operating_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.serial.port, "/dev/ttyACM0");
        assert_eq!(cfg.serial.baud_rate, 115200);
        assert_eq!(cfg.serial.settings().read_timeout, Duration::from_secs(1));
        assert_eq!(cfg.serial.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.serial.timing(), ListenerTiming::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyUSB1"
            max_open_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.serial.port, "/dev/ttyUSB1");
        assert_eq!(cfg.serial.baud_rate, 115200);
        assert_eq!(cfg.serial.retry_policy().max_attempts, Some(5));
        assert_eq!(cfg.network, NetworkConfig::default());
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.serial.baud_rate = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.serial.port = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, Config::default());
    }
}
