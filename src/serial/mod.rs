//! # Serial Communication Module
//!
//! Handles the connection to the sensor node over USB serial.
//!
//! This module handles:
//! - Locating the sensor node among enumerated serial devices
//! - Opening the port at the firmware's baud rate
//! - Bounded-timeout line reads with lossy UTF-8 decoding
//! - Surfacing connection loss to the ingestion loop

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::time::{timeout, Duration};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{Result, VaultError};

pub mod line_source;
pub mod locator;

/// Baud rate of the sensor node firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Initial capacity of the receive accumulator
const READ_BUFFER_CAPACITY: usize = 1024;

/// Serial connection to the sensor node.
///
/// Buffers raw bytes internally and hands out complete lines.
pub struct SensorSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
    /// Bytes received but not yet consumed as a line
    acc: BytesMut,
}

impl std::fmt::Debug for SensorSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SensorSerial {
    /// Open a serial port with the sensor node's settings (8N1).
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Line speed, typically [`DEFAULT_BAUD_RATE`]
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened (missing, busy, or
    /// permission denied)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| VaultError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened sensor device at {}", path);

        Ok(Self {
            port,
            device_path: path.to_string(),
            acc: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        })
    }

    /// Read the next line, waiting at most `wait` per read attempt.
    ///
    /// Returns `Ok(None)` when no complete line arrived in time; buffered
    /// partial data is kept for the next call. Line endings are stripped
    /// and invalid UTF-8 is replaced rather than rejected, matching the
    /// lenient decoding the sensor stream needs.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ConnectionLost`] when the device disappears
    /// (end of stream or read failure)
    pub async fn read_line(&mut self, wait: Duration) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.acc.iter().position(|&b| b == b'\n') {
                let raw = self.acc.split_to(pos + 1);
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                return Ok(Some(line));
            }

            // read_buf is cancel-safe, so a timeout here never loses bytes
            match timeout(wait, self.port.read_buf(&mut self.acc)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => {
                    return Err(VaultError::ConnectionLost(format!(
                        "{}: end of stream",
                        self.device_path
                    )));
                }
                Ok(Ok(n)) => debug!("Read {} bytes from {}", n, self.device_path),
                Ok(Err(e)) => {
                    return Err(VaultError::ConnectionLost(format!(
                        "{}: {}",
                        self.device_path, e
                    )));
                }
            }
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
