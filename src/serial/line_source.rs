//! Trait abstraction for line input to enable testing

use async_trait::async_trait;
use tokio::time::Duration;

use super::SensorSerial;
use crate::error::Result;

/// Trait for line-oriented input sources
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line, waiting at most `wait`.
    ///
    /// `Ok(None)` means no complete line arrived in time.
    async fn next_line(&mut self, wait: Duration) -> Result<Option<String>>;

    /// Identifier of the underlying device, for diagnostics
    fn describe(&self) -> String;
}

#[async_trait]
impl LineSource for SensorSerial {
    async fn next_line(&mut self, wait: Duration) -> Result<Option<String>> {
        self.read_line(wait).await
    }

    fn describe(&self) -> String {
        self.device_path().to_string()
    }
}
