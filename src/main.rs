//! # Sensor Vault
//!
//! Encrypted serial telemetry logger for Arduino sensor nodes.
//!
//! Reads line-oriented sensor telemetry (temperature, humidity, distance,
//! system state) from a USB serial device, assembles the lines into
//! records, encrypts each field, and appends the result to a local SQLite
//! store.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensor_vault::config::Config;
use sensor_vault::crypto::keys::KeyManager;
use sensor_vault::ingest;
use sensor_vault::store::LogStore;

/// Directory for the rolling pipeline log
const LOG_DIR: &str = "logs";

/// Main entry point for the Sensor Vault logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up console + rolling file logging
///    - Load configuration (optional path as the first argument)
///    - Open the record store and obtain the encryption key
///
/// 2. **Ingestion**
///    - Discover the sensor device and run the pipeline
///    - Reconnect with backoff on connection loss
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Shutdown**
///    - Log run totals (lines, frames, records, drops)
///
/// # Errors
///
/// Returns error if:
/// - The configuration is invalid
/// - The store or key file cannot be opened
/// - The connection is lost and every reconnect attempt fails
#[tokio::main]
async fn main() -> Result<()> {
    std::fs::create_dir_all(LOG_DIR)?;
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "sensor-vault.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    info!("Sensor Vault v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1);
    let config = Config::load_or_default(config_path.as_deref())?;

    let store = LogStore::open_at(&config.storage.db_path)?;
    let key = KeyManager::obtain(&config.crypto.key_path)?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    info!("Recording to {}", config.storage.db_path);
    info!("Press Ctrl+C to exit");

    match ingest::run_with_reconnect(&config, &key, &store, &mut shutdown_rx).await {
        Ok(stats) => {
            info!(
                "Run complete: {} lines read, {} frames, {} records written, {} frames dropped, {} records dropped",
                stats.lines_read,
                stats.frames_completed,
                stats.records_written,
                stats.frames_dropped,
                stats.records_dropped
            );
            Ok(())
        }
        Err(e) => {
            error!("Ingestion terminated: {}", e);
            Err(e.into())
        }
    }
}
