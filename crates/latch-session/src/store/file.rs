//! JSON file key-value backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] persisted as a JSON object on disk.
///
/// The file is read once on open and rewritten after every mutation.
/// Writes go to a sibling temporary file that is renamed over the
/// document, so readers never see a partial file.
/// Several processes may share a file; the last writer wins.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unparsable file opens empty;
    /// the next mutation replaces an unparsable file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(entries) => {
                    tracing::debug!(?path, keys = entries.len(), "Loaded session storage");
                    entries
                }
                Err(e) => {
                    tracing::warn!(?path, error = %e, "Failed to parse session storage, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            tracing::debug!(?path, "Session storage not found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Opens the store at the default location in the user config directory.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoStorageDir`] if there is no config directory, otherwise
    /// as [`FileStore::open`].
    pub fn open_default() -> Result<Self, StoreError> {
        let path = Self::default_path().ok_or(StoreError::NoStorageDir)?;
        Self::open(path)
    }

    /// Default storage file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("latch").join("session.json"))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&entries) {
            tracing::warn!(path = ?self.path, key, error = %e, "Failed to persist session storage");
        }
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_none() {
            return;
        }
        if let Err(e) = self.flush(&entries) {
            tracing::warn!(path = ?self.path, key, error = %e, "Failed to persist session storage");
        }
    }
}
