//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Config file path tried when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub frame: FrameConfig,

    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means auto-detect via the port locator
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Frame assembly limits
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    /// Maximum buffered lines before the frame is dropped
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Maximum buffered bytes before the frame is dropped
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

/// Encryption key configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CryptoConfig {
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

/// Persistence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

/// Reconnect policy after connection loss
#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

// Default value functions
fn default_baud_rate() -> u32 { crate::serial::DEFAULT_BAUD_RATE }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 100 }

fn default_max_lines() -> usize { crate::frame::DEFAULT_MAX_LINES }
fn default_max_bytes() -> usize { crate::frame::DEFAULT_MAX_BYTES }

fn default_key_path() -> String { crate::crypto::keys::DEFAULT_KEY_PATH.to_string() }
fn default_db_path() -> String { crate::store::DEFAULT_DB_PATH.to_string() }

fn default_max_attempts() -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 1000 }
fn default_max_backoff_ms() -> u64 { 30000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { key_path: default_key_path() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from [`DEFAULT_CONFIG_PATH`] if it
    /// exists, else fall back to built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    let config = Config::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if ![9600, 19200, 38400, 57600, 115200, 230400].contains(&self.serial.baud_rate) {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400")
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 10000")
            ));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 60000 {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("poll_interval_ms must be between 1 and 60000")
            ));
        }

        if self.frame.max_lines == 0 {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("max_lines must be greater than 0")
            ));
        }

        if self.frame.max_bytes < 256 {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("max_bytes must be at least 256")
            ));
        }

        if self.crypto.key_path.is_empty() {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("key_path cannot be empty")
            ));
        }

        if self.storage.db_path.is_empty() {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("db_path cannot be empty")
            ));
        }

        if self.reconnect.initial_backoff_ms == 0 || self.reconnect.initial_backoff_ms > 60000 {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("initial_backoff_ms must be between 1 and 60000")
            ));
        }

        if self.reconnect.max_backoff_ms < self.reconnect.initial_backoff_ms {
            return Err(crate::error::VaultError::Config(
                toml::de::Error::custom("max_backoff_ms must not be less than initial_backoff_ms")
            ));
        }

        Ok(())
    }
}
