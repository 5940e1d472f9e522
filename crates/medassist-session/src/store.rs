//! Durable token storage.
//!
//! The session manager persists exactly one string (the current access
//! token) under a fixed key, so a restarted client can pick up where it
//! left off. [`TokenStore`] is the seam; [`FileTokenStore`] is the durable
//! implementation and [`MemoryTokenStore`] the throwaway one.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::StoreError;

/// A key-value store the session manager reads its token from.
///
/// Methods are synchronous: every implementation here is a local file or
/// memory, and callers treat failures as non-fatal. The session manager
/// never calls them while holding its session state, so a slow disk
/// delays only the write itself.
pub trait TokenStore: Send + Sync + 'static {
    /// Returns the stored token, if any.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Replaces the stored token.
    fn save(&self, token: &str) -> Result<(), StoreError>;

    /// Removes the stored token. Removing a missing token is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// Keeps the token in memory only. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// Stores the token in a JSON object file (`{"<key>": "<token>", ...}`).
///
/// Other keys in the file are preserved, so several clients can share
/// one file with different keys. Writes go through a sibling temp file
/// and a rename, so a crash mid-write never leaves a half-written file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    key: String,
}

impl FileTokenStore {
    /// File name used under the platform data directory.
    pub const FILE_NAME: &'static str = "session.json";

    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// A store at `<data dir>/medassist/session.json`.
    ///
    /// # Errors
    /// Returns [`StoreError::NoDataDir`] if the platform has no data
    /// directory (e.g. `$HOME` is unset).
    pub fn in_data_dir(key: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dir.join("medassist").join(Self::FILE_NAME), key))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the map for modification. A corrupt file is replaced rather
    /// than blocking writes forever.
    fn read_map_for_write(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read_map() {
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "token store corrupt, starting fresh"
                );
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(map).map_err(StoreError::Corrupt)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.remove(&self.key))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        let mut map = self.read_map_for_write()?;
        map.insert(self.key.clone(), token.to_string());
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut map = self.read_map_for_write()?;
        if map.remove(&self.key).is_none() && self.path.exists() {
            return Ok(());
        }
        if map.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            self.write_map(&map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("nested").join("session.json"), "token")
    }

    // =====================================================================
    // MemoryTokenStore
    // =====================================================================

    #[test]
    fn test_memory_store_save_load_clear() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    // =====================================================================
    // FileTokenStore
    // =====================================================================

    #[test]
    fn test_file_store_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir).save("persisted").unwrap();

        // A fresh instance (think: process restart) sees the same token.
        let reopened = store_in(&dir);

        assert_eq!(reopened.load().unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_file_store_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let ours = FileTokenStore::new(&path, "token");
        let theirs = FileTokenStore::new(&path, "other");
        theirs.save("keep-me").unwrap();

        ours.save("mine").unwrap();
        ours.clear().unwrap();

        assert_eq!(ours.load().unwrap(), None);
        assert_eq!(theirs.load().unwrap().as_deref(), Some("keep-me"));
    }

    #[test]
    fn test_file_store_clear_removes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save("abc").unwrap();

        store.clear().unwrap();

        assert!(!store.path().exists());
        // Clearing again is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_load_errors_but_save_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));

        store.save("fresh").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("fresh"));
    }
}
