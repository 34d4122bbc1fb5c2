//! # Store Module
//!
//! Append-only SQLite persistence for sealed records.
//!
//! One row per completed frame; rows are never updated or deleted, and
//! insertion order (the autoincrement id) is the only ordering guarantee.
//! Duplicate timestamps are possible and acceptable. Concurrent logger
//! instances serialize at the SQLite layer, not in this process.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::info;

use crate::error::Result;
use crate::record::EncryptedRecord;

/// Default database path
pub const DEFAULT_DB_PATH: &str = "data/data.db";

/// SQLite-backed append-only record store
pub struct LogStore {
    conn: Connection,
}

impl LogStore {
    /// Open or create the database at `path`, creating parent directories
    /// as needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or SQLite cannot
    /// open the file
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self::init(Connection::open(path)?)?;
        info!("Opened record store at {}", path.display());
        Ok(store)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // synchronous=FULL: the insert must be durable before append returns
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;

            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                temperature TEXT,
                humidity TEXT,
                distance TEXT,
                state TEXT
            );
            "#,
        )?;

        Ok(Self { conn })
    }

    /// Append one sealed record.
    ///
    /// The statement autocommits, so the row is durable when this
    /// returns.
    ///
    /// # Returns
    ///
    /// * `Result<i64>` - The assigned row id
    pub fn append(&self, record: &EncryptedRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO logs (timestamp, temperature, humidity, distance, state)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.timestamp,
                record.temperature,
                record.humidity,
                record.distance,
                record.state
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Number of persisted rows
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All rows in insertion order, for the decrypt-side tooling.
    pub fn fetch_all(&self) -> Result<Vec<(i64, EncryptedRecord)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, temperature, humidity, distance, state
             FROM logs ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                EncryptedRecord {
                    timestamp: row.get(1)?,
                    temperature: row.get(2)?,
                    humidity: row.get(3)?,
                    distance: row.get(4)?,
                    state: row.get(5)?,
                },
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
