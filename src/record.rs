//! # Record Types
//!
//! Sensor observations in their plaintext, sealed, and decrypted forms.
//!
//! A `SensorRecord` lives for exactly one pipeline iteration: it is built
//! from a marker-terminated frame, sealed into an `EncryptedRecord`, and
//! persisted. The decrypt-side tooling reads rows back and opens them into
//! `DecryptedRecord` views, one field at a time.

use chrono::{DateTime, Local};
use fernet::Fernet;

use crate::crypto::fields::{decrypt_field, encrypt_field, DecryptedField};

/// Timestamp format used in persisted rows (second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One observation assembled from a marker-terminated frame.
///
/// Any subset of the sensor fields may be absent; a record is still valid
/// with nothing but its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// Wall clock at frame assembly time
    pub timestamp: DateTime<Local>,
    /// Temperature reading, if present in the frame
    pub temperature: Option<f64>,
    /// Humidity reading, if present in the frame
    pub humidity: Option<f64>,
    /// Distance reading, if present in the frame
    pub distance: Option<f64>,
    /// System state label, e.g. "Off", "Standby", "Alarm!!!"
    pub state: Option<String>,
}

impl SensorRecord {
    /// True if every sensor field is absent
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.distance.is_none()
            && self.state.is_none()
    }
}

/// A `SensorRecord` with every present field replaced by an opaque
/// ciphertext token. Absent fields stay `None` and are never encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedRecord {
    /// Formatted wall-clock timestamp (stored in the clear)
    pub timestamp: String,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub distance: Option<String>,
    pub state: Option<String>,
}

impl EncryptedRecord {
    /// Seal a record for persistence.
    ///
    /// Each field is encrypted independently; the tokens carry their own
    /// timestamp and integrity tag, so there is no cross-field binding.
    pub fn seal(record: &SensorRecord, fernet: &Fernet) -> Self {
        let number = |value: Option<f64>| {
            let text = value.map(|v| v.to_string());
            encrypt_field(fernet, text.as_deref())
        };

        Self {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            temperature: number(record.temperature),
            humidity: number(record.humidity),
            distance: number(record.distance),
            state: encrypt_field(fernet, record.state.as_deref()),
        }
    }
}

/// A stored row opened for the decrypt-side tooling.
///
/// Every field is independently possibly-unreadable; consumers must not
/// assume a row's fields are jointly consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedRecord {
    pub id: i64,
    pub timestamp: String,
    pub temperature: DecryptedField,
    pub humidity: DecryptedField,
    pub distance: DecryptedField,
    pub state: DecryptedField,
}

impl DecryptedRecord {
    /// Open a stored row under the given key.
    ///
    /// Never fails: fields that cannot be opened come back as
    /// [`DecryptedField::Unreadable`].
    pub fn open(id: i64, sealed: &EncryptedRecord, fernet: &Fernet) -> Self {
        Self {
            id,
            timestamp: sealed.timestamp.clone(),
            temperature: decrypt_field(fernet, sealed.temperature.as_deref()),
            humidity: decrypt_field(fernet, sealed.humidity.as_deref()),
            distance: decrypt_field(fernet, sealed.distance.as_deref()),
            state: decrypt_field(fernet, sealed.state.as_deref()),
        }
    }
}
