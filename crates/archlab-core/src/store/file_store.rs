//! File-backed session store.
//!
//! The native analog of the browser's local storage: one JSON file per cache
//! entry under a data directory, so a participant can close the client and
//! resume the session later.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{SessionStore, StoreError};

/// Session store persisting each entry as `<key>.json` in a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        // Write-then-rename so a crash mid-write never corrupts the entry.
        let tmp = self.entry_path(key).with_extension("json.tmp");
        std::fs::write(&tmp, payload).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, self.entry_path(key)).map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::Io(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(entry.path()).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}
