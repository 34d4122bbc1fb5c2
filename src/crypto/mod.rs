//! # Crypto Module
//!
//! Field-level encryption for persisted sensor records.
//!
//! This module handles:
//! - Encryption key lifecycle (load, generate, self-heal on corruption)
//! - Sealing individual field values into self-describing tokens
//! - Opening tokens with explicit absent/unreadable outcomes
//!
//! Tokens use the Fernet format: version byte, embedded timestamp, IV and
//! HMAC integrity tag, url-safe base64. Callers never manage nonces.

pub mod keys;
pub mod fields;
