//! Durable key/value storage with JSON (de)serialization.
//!
//! The host supplies a synchronous [`KeyValueStore`] primitive; the
//! orchestrator only ever talks to it through [`PersistentStore`], which
//! handles the JSON encoding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OrchestratorError, Result};

/// Synchronous put/get/remove of string values.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Stores each key as `<key>.json` inside a directory.
///
/// Writes go to a temporary sibling file first and are renamed into place,
/// so a crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the stored documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OrchestratorError::storage(key, e)),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| OrchestratorError::storage(key, e))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| OrchestratorError::storage(key, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| OrchestratorError::storage(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::storage(key, e)),
        }
    }
}

// ============================================================================
// PersistentStore
// ============================================================================

/// JSON layer over a [`KeyValueStore`].
pub struct PersistentStore {
    backend: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore").finish_non_exhaustive()
    }
}

impl PersistentStore {
    /// Wraps a host storage primitive.
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// A store backed by memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Reads the raw JSON document under `key` without decoding it into a type.
    pub fn load_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.load(key)
    }

    /// Reads and decodes the document under `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| OrchestratorError::stored_value_corrupted(key, e))
    }

    /// Encodes `value` and stores it under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.backend.put(key, &encoded)
    }

    /// Removes the document under `key`.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    // ------------------------------------------------------------------------
    // MemoryStore tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_memory_store_put_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.put("k", "v1").unwrap();
        store.put("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    // ------------------------------------------------------------------------
    // FileStore tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_file_store_creates_directory_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/state"));

        store.put("progress", "{}").unwrap();

        assert!(dir.path().join("nested/state/progress.json").exists());
        assert!(!dir.path().join("nested/state/progress.json.tmp").exists());
        assert_eq!(store.get("progress").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("absent").unwrap(), None);
        store.remove("absent").unwrap();
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put("../escape/attempt", "x").unwrap();

        assert!(dir.path().join("___escape_attempt.json").exists());
        assert_eq!(store.get("../escape/attempt").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_file_store_write_failure_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileStore::new(&blocker);
        let err = store.put("k", "v").unwrap_err();
        assert!(matches!(err, OrchestratorError::StorageError { .. }));
    }

    // ------------------------------------------------------------------------
    // PersistentStore tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_persistent_store_roundtrip() {
        let store = PersistentStore::in_memory();
        let sample = Sample {
            name: "lesson".to_string(),
            count: 3,
        };

        store.save("sample", &sample).unwrap();
        let loaded: Sample = store.load("sample").unwrap().unwrap();
        assert_eq!(loaded, sample);

        store.remove("sample").unwrap();
        assert!(store.load::<Sample>("sample").unwrap().is_none());
    }

    #[test]
    fn test_persistent_store_corrupted_value() {
        let memory = MemoryStore::new();
        memory.put("sample", "{ nope").unwrap();
        let store = PersistentStore::new(memory);

        let err = store.load::<Sample>("sample").unwrap_err();
        assert!(matches!(err, OrchestratorError::StoredValueCorrupted { .. }));
        assert!(store.load_value("sample").is_err());
    }

    #[test]
    fn test_persistent_store_load_value() {
        let store = PersistentStore::in_memory();
        store.save("sample", &serde_json::json!({"a": 1})).unwrap();

        let value = store.load_value("sample").unwrap().unwrap();
        assert_eq!(value["a"], 1);
    }
}
