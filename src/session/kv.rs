//! Key-value backends for persisted client state
//!
//! The session store writes a handful of string entries. Multi-key writes
//! and removals go through `put_all`/`remove_all` so a backend can apply
//! them as a single persisted update.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::SessionError;

// ============================================================================
// Key-Value Store Trait
// ============================================================================

/// Durable string key-value storage (the client's "local storage")
pub trait KeyValueStore: Send + Sync {
    /// Read a single entry
    fn get(&self, key: &str) -> Option<String>;

    /// Write several entries as one update
    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), SessionError>;

    /// Remove several entries as one update. Missing keys are ignored.
    fn remove_all(&self, keys: &[&str]) -> Result<(), SessionError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Non-durable store, used for tests and short-lived embeddings
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut map = self.entries.write();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// JSON file on disk, mirrored in memory
///
/// Every update rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written session. The in-memory
/// mirror only changes once the write has succeeded.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store, loading existing entries if the file is present.
    ///
    /// Unreadable or corrupt contents are logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read session file");
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
        let mut map = self.entries.write();
        let mut next = map.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), value.clone());
        }
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut map = self.entries.write();
        let mut next = map.clone();
        for key in keys {
            next.remove(*key);
        }
        if next.len() == map.len() && self.path.exists() {
            return Ok(());
        }
        self.persist(&next)?;
        *map = next;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store
            .put_all(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.len(), 2);

        store.remove_all(&["a", "missing"]).unwrap();
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("session.json");

        let store = FileStore::open(&path);
        store.put_all(&[("token", "abc".to_string())]).unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("token").as_deref(), Some("abc"));

        reopened.remove_all(&["token"]).unwrap();
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("token"), None);
    }

    #[test]
    fn test_failed_write_leaves_entries_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let store = FileStore::open(blocker.join("session.json"));
        assert!(store.put_all(&[("token", "abc".to_string())]).is_err());
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_failed_removal_keeps_memory_in_step_with_disk() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("state");
        let path = dir.join("session.json");

        let store = FileStore::open(&path);
        store.put_all(&[("token", "abc".to_string())]).unwrap();

        // Make the next write fail: the temp sibling cannot be created
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(store.remove_all(&["token"]).is_err());
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        assert_eq!(FileStore::open(&path).get("token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get("token"), None);

        // Writing repairs the file
        store.put_all(&[("token", "abc".to_string())]).unwrap();
        assert_eq!(FileStore::open(&path).get("token").as_deref(), Some("abc"));
    }
}
