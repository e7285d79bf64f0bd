use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

/// Token file name in the data directory
const TOKEN_FILE: &str = "token";

/// Keychain service and account used for the token slot
const SERVICE_NAME: &str = "farmstarter";
const KEYRING_ACCOUNT: &str = "access_token";

/// Persistent slot holding at most one bearer credential.
///
/// Stores do not look inside the credential; decoding and expiry checks
/// belong to the session layer.
pub trait TokenStore: Send + Sync {
    /// Persist the credential, replacing any previous value
    fn save(&self, credential: &str) -> Result<()>;

    /// Read the stored credential, if any
    fn load(&self) -> Result<Option<String>>;

    /// Remove the stored credential. Clearing an empty slot is not an error.
    fn clear(&self) -> Result<()>;
}

/// Token kept as a single file on disk
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, credential: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create token directory {}", self.dir.display()))?;
        std::fs::write(self.path(), credential).context("Failed to write token file")?;
        debug!(path = %self.path().display(), "Token saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to delete token file")?;
            debug!(path = %path.display(), "Token file removed");
        }
        Ok(())
    }
}

/// Token kept in the OS keychain
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, credential: &str) -> Result<()> {
        self.entry()?
            .set_password(credential)
            .context("Failed to store token in keychain")
    }

    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// In-process slot; nothing survives the process
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(credential: &str) -> Self {
        Self {
            slot: Mutex::new(Some(credential.to_string())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned slot still holds a usable value
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, credential: &str) -> Result<()> {
        *self.slot() = Some(credential.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested"));

        assert_eq!(store.load().unwrap(), None);

        store.save("first").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("first"));

        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf());
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_empty_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_does_not_validate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf());
        store.save("definitely not a jwt").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("definitely not a jwt"));
    }

    #[test]
    fn test_keyring_store_empty_slot() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringTokenStore::with_service("farmstarter-test");

        // A missing entry reads as no token, and clearing it twice is fine
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
        store.clear().unwrap();
        store.save("abc").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.save("def").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("def"));
    }
}
