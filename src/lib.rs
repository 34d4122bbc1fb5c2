//! # Sensor Vault Library
//!
//! Encrypted serial telemetry logger for Arduino sensor nodes.
//!
//! This library provides the core ingestion pipeline: serial port discovery,
//! line buffering and frame assembly, field parsing with partial-data
//! tolerance, per-field authenticated encryption, and durable append-only
//! persistence to SQLite.

pub mod config;
pub mod error;
pub mod crypto;
pub mod frame;
pub mod record;
pub mod serial;
pub mod store;
pub mod ingest;
