//! # Error Types
//!
//! Custom error types for Sensor Vault using `thiserror`.

use thiserror::Error;

/// Main error type for Sensor Vault
#[derive(Debug, Error)]
pub enum VaultError {
    /// Serial port open or configuration errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Serial connection lost mid-stream
    #[error("Serial connection lost: {0}")]
    ConnectionLost(String),

    /// No serial device present on the host
    #[error("No serial ports found")]
    NoPortsFound,

    /// Encryption key errors
    #[error("Key error: {0}")]
    Key(String),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Sensor Vault
pub type Result<T> = std::result::Result<T, VaultError>;
