use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

/// Key/value home for opaque snapshots.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn save(&self, key: &str, data: &str) -> Result<(), PersistenceError>;
}

/// Process-local store, mostly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let map = self
            .map
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn save(&self, key: &str, data: &str) -> Result<(), PersistenceError> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".into()))?;
        map.insert(key.to_string(), data.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, data: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        // write-then-rename: readers see the old or the new snapshot, never a partial one
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load("k").unwrap().is_none());
        store.save("k", "v").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_store_creates_dir_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("nested"));
        assert!(store.load("ledger").unwrap().is_none());
        store.save("ledger", "one").unwrap();
        store.save("ledger", "two").unwrap();
        assert_eq!(store.load("ledger").unwrap().as_deref(), Some("two"));
    }
}
