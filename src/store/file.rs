//! JSON-file settings store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SettingsStore, StoreError, StoreResult};
use crate::atomic_file::write_atomic_private;

/// A durable store persisting every setting to one JSON document.
///
/// Writes are globally serialized by a mutex. A `set` rewrites the whole file
/// through a temp-file rename, so a crash leaves either the previous or the
/// new document on disk. The in-memory copy only changes after the file is
/// durable.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() {
            let content = std::fs::read(&path)?;
            if content.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = ?path, settings = map.len(), "Settings store opened");

        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<String> {
        let map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        if map.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }

        let mut next = map.clone();
        next.insert(key.to_string(), value.to_string());
        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomic_private(&self.path, &bytes)?;

        *map = next;
        Ok(())
    }

    fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        let map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = FileStore::open(&path).unwrap();
        store.set("ServerPort", "9999").unwrap();
        store.set("Theme", "dark").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("ServerPort").unwrap(), "9999");
        assert_eq!(reopened.entries().unwrap().len(), 2);
    }

    #[test]
    fn repeated_set_leaves_identical_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileStore::open(&path).unwrap();

        store.set("Language", "en").unwrap();
        let once = std::fs::read(&path).unwrap();
        store.set("Language", "en").unwrap();
        let twice = std::fs::read(&path).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(FileStore::open(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("settings.json")).unwrap();
        assert!(matches!(store.get("Nope"), Err(StoreError::NotFound(_))));
    }
}
