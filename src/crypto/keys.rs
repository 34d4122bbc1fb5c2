//! # Key Manager
//!
//! Owns the lifecycle of the symmetric encryption key: load an existing
//! key file, or generate and persist a fresh one. A corrupted key file is
//! replaced in place rather than aborting the run; records sealed under
//! the old key become permanently unreadable, which this design accepts
//! in exchange for an ingestion pipeline that never blocks on key state.

use std::fs;
use std::path::{Path, PathBuf};

use fernet::Fernet;
use tracing::{info, warn};

use crate::error::{Result, VaultError};

/// Default location of the persisted key file
pub const DEFAULT_KEY_PATH: &str = "secrets/secret.key";

/// Probe plaintext for the load-time round-trip self-test
const SELF_TEST_PLAINTEXT: &[u8] = b"sensor-vault key self-test";

/// Holds the process-wide encryption key for the life of a run.
pub struct KeyManager {
    fernet: Fernet,
    key: String,
    path: PathBuf,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    /// Load the key at `path`, generating a new one when needed.
    ///
    /// A missing or zero-length file yields a freshly generated key. An
    /// existing file is validated with an encrypt/decrypt round-trip; on
    /// any validation failure the file is overwritten with a new key and
    /// the recovery is logged. At most one key write happens per process
    /// unless corruption is detected.
    ///
    /// # Errors
    ///
    /// Returns error only for filesystem failures (unreadable directory,
    /// write-protected key file). Corrupt key content is recovered, not
    /// reported.
    pub fn obtain<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let missing_or_empty = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if missing_or_empty {
            info!("No key file at {}, generating one", path.display());
            return Self::generate_at(path);
        }

        let raw = fs::read(path)?;
        let key = String::from_utf8_lossy(&raw).trim().to_string();
        match Self::validate(&key) {
            Some(fernet) => Ok(Self {
                fernet,
                key,
                path: path.to_path_buf(),
            }),
            None => {
                warn!("Key file at {} failed validation, replacing it", path.display());
                Self::generate_at(path)
            }
        }
    }

    /// Construct a cipher handle and prove it with a round-trip.
    ///
    /// Guards against partial writes and encoding corruption in the key
    /// file, not against an adversary with filesystem access.
    fn validate(key: &str) -> Option<Fernet> {
        let fernet = Fernet::new(key)?;
        let token = fernet.encrypt(SELF_TEST_PLAINTEXT);
        match fernet.decrypt(&token) {
            Ok(plain) if plain == SELF_TEST_PLAINTEXT => Some(fernet),
            _ => None,
        }
    }

    fn generate_at(path: &Path) -> Result<Self> {
        let key = Fernet::generate_key();
        fs::write(path, &key)?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
        }

        let fernet = Fernet::new(&key)
            .ok_or_else(|| VaultError::Key("generated key failed validation".to_string()))?;

        Ok(Self {
            fernet,
            key,
            path: path.to_path_buf(),
        })
    }

    /// Cipher handle for sealing and opening fields
    pub fn fernet(&self) -> &Fernet {
        &self.fernet
    }

    /// The url-safe base64 key material
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Location of the persisted key file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_obtain_creates_key_and_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets").join("secret.key");

        let manager = KeyManager::obtain(&path).unwrap();

        assert!(path.exists());
        let persisted = fs::read_to_string(&path).unwrap();
        assert!(!persisted.is_empty());
        assert_eq!(persisted.trim(), manager.key());
    }

    #[test]
    fn test_obtain_regenerates_zero_length_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        fs::write(&path, b"").unwrap();

        let manager = KeyManager::obtain(&path).unwrap();

        let persisted = fs::read_to_string(&path).unwrap();
        assert!(!persisted.is_empty());
        assert_eq!(persisted.trim(), manager.key());
    }

    #[test]
    fn test_obtain_replaces_wrong_length_random_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        fs::write(&path, [0x7fu8, 0x03, 0xff, 0x10, 0x99]).unwrap();

        let manager = KeyManager::obtain(&path).unwrap();

        // The junk must be gone and the new key must work
        let token = manager.fernet().encrypt(b"probe");
        assert_eq!(manager.fernet().decrypt(&token).unwrap(), b"probe");
        assert_ne!(fs::read(&path).unwrap(), [0x7fu8, 0x03, 0xff, 0x10, 0x99]);
    }

    #[test]
    fn test_obtain_replaces_non_base64_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        fs::write(&path, "definitely not a fernet key!!!").unwrap();

        let manager = KeyManager::obtain(&path).unwrap();
        let token = manager.fernet().encrypt(b"probe");
        assert_eq!(manager.fernet().decrypt(&token).unwrap(), b"probe");
    }

    #[test]
    fn test_obtain_twice_returns_same_key_without_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");

        let first = KeyManager::obtain(&path).unwrap();
        let persisted_after_first = fs::read(&path).unwrap();

        let second = KeyManager::obtain(&path).unwrap();
        let persisted_after_second = fs::read(&path).unwrap();

        assert_eq!(first.key(), second.key());
        assert_eq!(persisted_after_first, persisted_after_second);
    }

    #[test]
    fn test_obtain_accepts_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        let key = Fernet::generate_key();
        fs::write(&path, format!("{}\n", key)).unwrap();

        let manager = KeyManager::obtain(&path).unwrap();
        assert_eq!(manager.key(), key);
    }

    #[test]
    fn test_tokens_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");

        let first = KeyManager::obtain(&path).unwrap();
        let token = first.fernet().encrypt(b"persisted value");
        drop(first);

        let second = KeyManager::obtain(&path).unwrap();
        assert_eq!(second.fernet().decrypt(&token).unwrap(), b"persisted value");
    }
}
