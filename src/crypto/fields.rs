//! # Field Encryptor
//!
//! Seals and opens individual field values. Absent values are never
//! encrypted, and an unopenable token is reported as its own outcome
//! rather than an error or an in-band sentinel string, so downstream
//! consumers can tell "absent", "failed to decrypt", and a genuine value
//! apart.

use fernet::Fernet;

/// Outcome of opening one persisted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptedField {
    /// The field held a value and the token opened cleanly
    Present(String),
    /// The field was absent from the record (stored as NULL)
    Absent,
    /// A token was present but could not be opened under the current key.
    /// A data-quality flag, not a fatal condition.
    Unreadable,
}

impl DecryptedField {
    /// The decrypted value, if this field held one
    pub fn value(&self) -> Option<&str> {
        match self {
            DecryptedField::Present(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of the value, for the analysis tooling
    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(|v| v.parse().ok())
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, DecryptedField::Unreadable)
    }
}

/// Seal one field value.
///
/// `None` passes through untouched: absence is represented by NULL in the
/// store, never by an encrypted placeholder.
pub fn encrypt_field(fernet: &Fernet, value: Option<&str>) -> Option<String> {
    value.map(|v| fernet.encrypt(v.as_bytes()))
}

/// Open one field token.
///
/// Never fails: wrong key, truncation, and foreign encodings all come back
/// as [`DecryptedField::Unreadable`]. The token's integrity tag makes a
/// silently wrong plaintext impossible.
pub fn decrypt_field(fernet: &Fernet, token: Option<&str>) -> DecryptedField {
    let token = match token {
        None => return DecryptedField::Absent,
        Some(t) if t.is_empty() => return DecryptedField::Absent,
        Some(t) => t,
    };

    match fernet.decrypt(token) {
        Ok(plain) => match String::from_utf8(plain) {
            Ok(value) => DecryptedField::Present(value),
            Err(_) => DecryptedField::Unreadable,
        },
        Err(_) => DecryptedField::Unreadable,
    }
}
