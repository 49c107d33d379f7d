use crate::errors::{DownloaderError, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Fixed obfuscation key, shared with the existing credential file format.
/// This is not a secret and provides no confidentiality; it only keeps the
/// credentials out of plaintext on disk.
const OBFUSCATION_KEY: &[u8] = b"SpotifyDownloader2025";

/// Credential file name, written to the working directory.
const CREDENTIAL_FILE: &str = "credential.cdi";

// save() and clear() both rewrite the file; without a UI serializing them
// a process-wide lock keeps concurrent writers out.
static FILE_LOCK: Mutex<()> = Mutex::new(());

/// Saved Spotify API credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Store for the obfuscated credential file
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::at(CREDENTIAL_FILE)
    }
}

impl CredentialStore {
    /// Create a store backed by a specific file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Obfuscate both strings and write them as two hex lines, overwriting
    /// any previous content
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let _guard = FILE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let content = format!(
            "{}\n{}",
            obfuscate(&credentials.client_id),
            obfuscate(&credentials.client_secret)
        );
        std::fs::write(&self.path, content)?;
        debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }

    /// Load saved credentials. A missing file is not an error; a corrupt one
    /// is a `Decode` error the caller should treat as "no saved credentials".
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let mut lines = content.lines();
        let (id_line, secret_line) = match (lines.next(), lines.next()) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(DownloaderError::Decode(format!(
                    "{}: expected two lines",
                    self.path.display()
                )))
            }
        };

        Ok(Some(Credentials {
            client_id: deobfuscate(id_line.trim())?,
            client_secret: deobfuscate(secret_line.trim())?,
        }))
    }

    /// Delete the credential file if present
    pub fn clear(&self) -> Result<()> {
        let _guard = FILE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!("Credentials cleared");
        }
        Ok(())
    }
}

/// XOR with the repeating key, then hex-encode
fn obfuscate(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for (i, byte) in text.bytes().enumerate() {
        let k = OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()];
        out.push_str(&format!("{:02x}", byte ^ k));
    }
    out
}

/// Hex-decode, then reverse the XOR (XOR is its own inverse)
fn deobfuscate(hex: &str) -> Result<String> {
    let raw = hex.as_bytes();
    if raw.len() % 2 != 0 {
        return Err(DownloaderError::Decode(
            "odd-length hex in credential file".to_string(),
        ));
    }

    // Pairs are taken from the raw bytes: a corrupted file may hold
    // multibyte characters, and slicing the str by byte index would panic
    // on them instead of failing with Decode.
    let mut bytes = Vec::with_capacity(raw.len() / 2);
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        let digits = std::str::from_utf8(pair)
            .map_err(|_| DownloaderError::Decode("invalid hex in credential file".to_string()))?;
        let byte = u8::from_str_radix(digits, 16)
            .map_err(|_| DownloaderError::Decode("invalid hex in credential file".to_string()))?;
        let k = OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()];
        bytes.push(byte ^ k);
    }

    String::from_utf8(bytes)
        .map_err(|_| DownloaderError::Decode("credential file is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::at(dir.path().join("credential.cdi"))
    }

    #[test]
    fn obfuscation_round_trips() {
        for s in ["", "abc", "client-id-1234", "sécrèt ünicode ✓"] {
            assert_eq!(deobfuscate(&obfuscate(s)).unwrap(), s);
        }
    }

    #[test]
    fn obfuscation_matches_known_file_format() {
        // "abc" XOR "Spo" -> 32 12 0c
        assert_eq!(obfuscate("abc"), "32120c");
    }

    #[test]
    fn load_returns_none_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_returns_same_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let creds = Credentials {
            client_id: "abc".to_string(),
            client_secret: "xyz".to_string(),
        };

        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));
    }

    #[test]
    fn save_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&Credentials {
                client_id: "old-id".to_string(),
                client_secret: "old-secret".to_string(),
            })
            .unwrap();
        store
            .save(&Credentials {
                client_id: "new-id".to_string(),
                client_secret: "new-secret".to_string(),
            })
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.client_id, "new-id");
        assert_eq!(loaded.client_secret, "new-secret");
    }

    #[test]
    fn corrupt_hex_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.cdi");
        std::fs::write(&path, "not-hex\nzzzz").unwrap();

        let store = CredentialStore::at(path);
        match store.load() {
            Err(DownloaderError::Decode(_)) => {}
            other => panic!("expected Decode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn multibyte_corruption_is_a_decode_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.cdi");
        // "€" is three bytes; "€x" is even-length in bytes but lands a
        // naive two-byte slice inside a character.
        std::fs::write(&path, "€x\n€x").unwrap();

        let store = CredentialStore::at(path);
        assert!(matches!(store.load(), Err(DownloaderError::Decode(_))));
    }

    #[test]
    fn single_line_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.cdi");
        std::fs::write(&path, "32120c").unwrap();

        let store = CredentialStore::at(path);
        assert!(matches!(store.load(), Err(DownloaderError::Decode(_))));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.clear().unwrap();

        store
            .save(&Credentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            })
            .unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
