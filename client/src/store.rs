use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use vdlab_core::credential::STORAGE_KEY;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential storage entry is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Client-local key-value persistence for the chat credential. Injected
/// into the controller so it can be exercised against an in-memory fake.
pub trait CredentialStore {
    /// The stored key, if any. Absence and unreadable storage look the
    /// same to the caller — there is no key to restore either way.
    fn load(&self) -> Option<String>;
    fn save(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// One JSON file under the user config dir holding the single credential
/// entry. Written with 0600 permissions.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `<config_dir>/vdlab/credentials.json`.
    pub fn default_path() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vdlab");
        Self::new(config_dir.join("credentials.json"))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&data).ok()?;
        entries.get(STORAGE_KEY).cloned().filter(|k| !k.is_empty())
    }

    fn save(&self, key: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = BTreeMap::new();
        entries.insert(STORAGE_KEY.to_string(), key.to_string());
        let data = serde_json::to_string_pretty(&entries)?;

        // Credential file: owner read/write only.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(Some(key.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.key.lock().ok()?.clone()
    }

    fn save(&self, key: &str) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.key.lock() {
            *slot = Some(key.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.key.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

// Elsewhere the mode bits have no meaning; accept and ignore them so the
// save path stays a single code path.
#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load(), None);
        store.save("AIza123").expect("save");
        assert_eq!(store.load().as_deref(), Some("AIza123"));
        store.clear().expect("clear");
        assert_eq!(store.load(), None);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));

        assert_eq!(store.load(), None);
        store.save("AIzaStoredKey").expect("save");
        assert_eq!(store.load().as_deref(), Some("AIzaStoredKey"));

        store.clear().expect("clear");
        assert_eq!(store.load(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_overwrites_previous_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));

        store.save("AIzaOld").expect("save");
        store.save("AIzaNew").expect("save");
        assert_eq!(store.load().as_deref(), Some("AIzaNew"));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        store.save("AIzaPerm").expect("save");

        let mode = std::fs::metadata(store.path())
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
