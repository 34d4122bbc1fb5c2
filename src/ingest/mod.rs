//! # Ingestion Module
//!
//! The sequential pipeline that drives read → assemble → parse → encrypt
//! → persist, plus the reconnect policy wrapped around it.
//!
//! One logical stream of execution per logger instance: the loop reads
//! the connection with a bounded timeout, feeds the frame assembler, and
//! appends one sealed row per completed frame. Shutdown is honored at
//! every read boundary. Connection loss is retried with exponential
//! backoff and port re-discovery; exhausting the retry budget ends the
//! run with the underlying error.

use fernet::Fernet;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crypto::keys::KeyManager;
use crate::error::{Result, VaultError};
use crate::frame::{parser, FrameAssembler};
use crate::record::EncryptedRecord;
use crate::serial::line_source::LineSource;
use crate::serial::{locator, SensorSerial};
use crate::store::LogStore;

/// Counters accumulated over one ingestion run
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    /// Non-empty lines received
    pub lines_read: u64,
    /// Marker-terminated frames handed to the parser
    pub frames_completed: u64,
    /// Frame buffers discarded for exceeding a cap
    pub frames_dropped: u64,
    /// Rows durably appended
    pub records_written: u64,
    /// Records dropped after a failed append and retry
    pub records_dropped: u64,
}

/// The read → assemble → parse → encrypt → persist loop.
///
/// Generic over its line source so the whole pipeline runs against a
/// mock in tests. Survives reconnects: the assembler state and counters
/// carry across connections.
pub struct Pipeline {
    assembler: FrameAssembler,
    read_timeout: Duration,
    poll_interval: Duration,
    lines_read: u64,
    frames_completed: u64,
    records_written: u64,
    records_dropped: u64,
}

impl Pipeline {
    pub fn new(assembler: FrameAssembler, read_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            assembler,
            read_timeout,
            poll_interval,
            lines_read: 0,
            frames_completed: 0,
            records_written: 0,
            records_dropped: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            FrameAssembler::new(config.frame.max_lines, config.frame.max_bytes),
            Duration::from_millis(config.serial.read_timeout_ms),
            Duration::from_millis(config.serial.poll_interval_ms),
        )
    }

    /// Drive the pipeline until shutdown or connection loss.
    ///
    /// Returns `Ok(())` on a requested shutdown. Connection loss
    /// propagates so the caller can decide whether to reconnect.
    pub async fn run<S: LineSource>(
        &mut self,
        source: &mut S,
        fernet: &Fernet,
        store: &LogStore,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        info!("Logging from {}", source.describe());

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let line = tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                line = source.next_line(self.read_timeout) => line?,
            };

            if let Some(line) = line {
                if !line.is_empty() {
                    self.lines_read += 1;
                    debug!("serial: {}", line);

                    if let Some(frame) = self.assembler.push_line(&line) {
                        self.frames_completed += 1;
                        self.persist_frame(&frame, fernet, store);
                    }
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Parse, seal, and append one frame.
    ///
    /// A failed append is retried once; a second failure drops the record
    /// with an explicit count rather than aborting the stream.
    fn persist_frame(&mut self, frame: &str, fernet: &Fernet, store: &LogStore) {
        let record = parser::parse(frame);
        let sealed = EncryptedRecord::seal(&record, fernet);

        let appended = store.append(&sealed).or_else(|e| {
            warn!("Record append failed, retrying once: {}", e);
            store.append(&sealed)
        });

        match appended {
            Ok(id) => {
                self.records_written += 1;
                debug!("Persisted record {}", id);
            }
            Err(e) => {
                self.records_dropped += 1;
                error!("Dropping record after failed retry: {}", e);
            }
        }
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            lines_read: self.lines_read,
            frames_completed: self.frames_completed,
            frames_dropped: self.assembler.dropped_frames(),
            records_written: self.records_written,
            records_dropped: self.records_dropped,
        }
    }
}

/// Run the pipeline with the configured reconnect policy.
///
/// The port is (re)discovered before every connection attempt unless the
/// config pins one. A successful connection resets the retry budget;
/// `max_attempts` consecutive failures end the run with the last error.
pub async fn run_with_reconnect(
    config: &Config,
    key: &KeyManager,
    store: &LogStore,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<IngestStats> {
    let mut pipeline = Pipeline::from_config(config);
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return Ok(pipeline.stats());
        }

        let outcome = match connect(config) {
            Ok(mut serial) => {
                attempt = 0;
                pipeline.run(&mut serial, key.fernet(), store, shutdown).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => return Ok(pipeline.stats()),
            Err(e) => {
                attempt += 1;
                if attempt > config.reconnect.max_attempts {
                    error!(
                        "Giving up after {} reconnect attempts: {}",
                        config.reconnect.max_attempts, e
                    );
                    return Err(e);
                }

                let delay = backoff_delay(config, attempt);
                warn!(
                    "Connection failed ({}), retrying in {:?} (attempt {}/{})",
                    e, delay, attempt, config.reconnect.max_attempts
                );

                tokio::select! {
                    _ = shutdown.changed() => return Ok(pipeline.stats()),
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

/// Discover and open the sensor device.
fn connect(config: &Config) -> Result<SensorSerial> {
    let path = if config.serial.port.is_empty() {
        locator::select_port()?.ok_or(VaultError::NoPortsFound)?
    } else {
        config.serial.port.clone()
    };

    SensorSerial::open(&path, config.serial.baud_rate)
}

/// Exponential backoff for the given attempt, capped by the config.
fn backoff_delay(config: &Config, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let ms = config
        .reconnect
        .initial_backoff_ms
        .saturating_mul(1u64 << shift)
        .min(config.reconnect.max_backoff_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DecryptedRecord;
    use crate::serial::line_source::mocks::{AfterLines, MockLineSource};
    use tempfile::TempDir;

    fn test_key() -> KeyManager {
        let dir = TempDir::new().unwrap();
        let manager = KeyManager::obtain(dir.path().join("secret.key")).unwrap();
        // The key material lives in memory; the temp dir can go away
        manager
    }

    fn fast_pipeline() -> Pipeline {
        Pipeline::new(
            FrameAssembler::default(),
            Duration::from_millis(5),
            Duration::from_millis(1),
        )
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the whole test
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_end_to_end_single_frame() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();
        let mut source = MockLineSource::new(
            &[
                "Temperature: 23.4 °C",
                "Humidity: 40 %",
                "Distance: 120 sm",
                "System state: Alarm!!!",
            ],
            AfterLines::Disconnect,
        );

        let mut pipeline = fast_pipeline();
        let mut shutdown = no_shutdown();
        let result = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;

        // The mock unplugs after its lines, which ends the run
        assert!(matches!(result, Err(VaultError::ConnectionLost(_))));

        let stats = pipeline.stats();
        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.frames_completed, 1);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.records_dropped, 0);

        let rows = store.fetch_all().unwrap();
        assert_eq!(rows.len(), 1);
        let (id, sealed) = &rows[0];
        let opened = DecryptedRecord::open(*id, sealed, key.fernet());
        assert_eq!(opened.temperature.as_f64(), Some(23.4));
        assert_eq!(opened.humidity.as_f64(), Some(40.0));
        assert_eq!(opened.distance.as_f64(), Some(120.0));
        assert_eq!(opened.state.value(), Some("Alarm!!!"));
    }

    #[tokio::test]
    async fn test_multiple_frames_multiple_rows() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();
        let mut source = MockLineSource::new(
            &[
                "Temperature: 20.0 °C",
                "System state: Off",
                "Temperature: 25.0 °C",
                "System state: Standby",
            ],
            AfterLines::Disconnect,
        );

        let mut pipeline = fast_pipeline();
        let mut shutdown = no_shutdown();
        let _ = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;

        assert_eq!(pipeline.stats().frames_completed, 2);
        assert_eq!(store.count().unwrap(), 2);

        let rows = store.fetch_all().unwrap();
        let second = DecryptedRecord::open(rows[1].0, &rows[1].1, key.fernet());
        assert_eq!(second.temperature.as_f64(), Some(25.0));
        assert_eq!(second.state.value(), Some("Standby"));
        assert_eq!(second.humidity, crate::crypto::fields::DecryptedField::Absent);
    }

    #[tokio::test]
    async fn test_incomplete_frame_is_not_persisted() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();
        let mut source = MockLineSource::new(
            &["Temperature: 23.4 °C", "Humidity: 40 %"],
            AfterLines::Disconnect,
        );

        let mut pipeline = fast_pipeline();
        let mut shutdown = no_shutdown();
        let result = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;

        assert!(result.is_err());
        // No marker line arrived, so nothing was persisted
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(pipeline.stats().frames_completed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_reads_nothing() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();
        let mut source = MockLineSource::new(&["System state: Off"], AfterLines::Timeout);

        let (tx, mut shutdown) = watch::channel(true);
        let mut pipeline = fast_pipeline();
        let result = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;
        drop(tx);

        assert!(result.is_ok());
        assert_eq!(source.remaining(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_idle_loop() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();
        let mut source = MockLineSource::new(&[], AfterLines::Timeout);

        let (tx, mut shutdown) = watch::channel(false);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let mut pipeline = fast_pipeline();
        let result = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_buffer_is_dropped_and_counted() {
        let key = test_key();
        let store = LogStore::open_in_memory().unwrap();

        let mut lines: Vec<String> = (0..10).map(|i| format!("noise line {}", i)).collect();
        lines.push("System state: Off".to_string());
        let line_refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let mut source = MockLineSource::new(&line_refs, AfterLines::Disconnect);

        let mut pipeline = Pipeline::new(
            FrameAssembler::new(4, 4096),
            Duration::from_millis(5),
            Duration::from_millis(1),
        );
        let mut shutdown = no_shutdown();
        let _ = pipeline
            .run(&mut source, key.fernet(), &store, &mut shutdown)
            .await;

        let stats = pipeline.stats();
        assert!(stats.frames_dropped >= 1);
        // The marker after the noise still produced a (partial) record
        assert_eq!(stats.frames_completed, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        let config = Config::default();
        let first = backoff_delay(&config, 1);
        let second = backoff_delay(&config, 2);
        let huge = backoff_delay(&config, 40);

        assert_eq!(first, Duration::from_millis(config.reconnect.initial_backoff_ms));
        assert_eq!(second, first * 2);
        assert_eq!(huge, Duration::from_millis(config.reconnect.max_backoff_ms));
    }
}
