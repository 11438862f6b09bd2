//! Local primitive key-value storage

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use feelgood_core::{sanitize_interval, ProgressRecord, RecordTime, StoreResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

pub const KEY_SCORE: &str = "score";
pub const KEY_FLOWERS_SEEN: &str = "flowersSeen";
pub const KEY_INTERVAL: &str = "rectangleAppearanceInterval";
pub const KEY_LAST_MODIFIED: &str = "lastModified";

/// Synchronous primitive accessors keyed by name.
///
/// Missing keys read as zero. There are no transactions; a single writer
/// is assumed.
pub trait LocalStore: Send + Sync {
    fn get_int(&self, key: &str) -> i64;
    fn set_int(&self, key: &str, value: i64);
    fn get_float(&self, key: &str) -> f64;
    fn set_float(&self, key: &str, value: f64);

    /// Make previous writes durable
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// One stored primitive
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Int(i64),
    Float(f64),
}

impl StoredValue {
    fn as_int(self) -> i64 {
        match self {
            StoredValue::Int(v) => v,
            StoredValue::Float(v) if v.is_finite() => v as i64,
            StoredValue::Float(_) => 0,
        }
    }

    fn as_float(self) -> f64 {
        match self {
            StoredValue::Int(v) => v as f64,
            StoredValue::Float(v) => v,
        }
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get_int(&self, key: &str) -> i64 {
        self.values.read().get(key).map(|v| v.as_int()).unwrap_or(0)
    }

    fn set_int(&self, key: &str, value: i64) {
        self.values.write().insert(key.to_string(), StoredValue::Int(value));
    }

    fn get_float(&self, key: &str) -> f64 {
        self.values.read().get(key).map(|v| v.as_float()).unwrap_or(0.0)
    }

    fn set_float(&self, key: &str, value: f64) {
        self.values.write().insert(key.to_string(), StoredValue::Float(value));
    }
}

/// Store persisted as a JSON object on disk.
///
/// Writes stay in memory until `flush`, which replaces the file through a
/// temporary sibling so a crash never leaves a truncated file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, StoredValue>>,
    dirty: Mutex<bool>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "opened local store");

        Ok(JsonFileStore {
            path,
            values: RwLock::new(values),
            dirty: Mutex::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(&self, key: &str, value: StoredValue) {
        self.values.write().insert(key.to_string(), value);
        *self.dirty.lock() = true;
    }
}

impl LocalStore for JsonFileStore {
    fn get_int(&self, key: &str) -> i64 {
        self.values.read().get(key).map(|v| v.as_int()).unwrap_or(0)
    }

    fn set_int(&self, key: &str, value: i64) {
        self.insert(key, StoredValue::Int(value));
    }

    fn get_float(&self, key: &str) -> f64 {
        self.values.read().get(key).map(|v| v.as_float()).unwrap_or(0.0)
    }

    fn set_float(&self, key: &str, value: f64) {
        self.insert(key, StoredValue::Float(value));
    }

    fn flush(&self) -> StoreResult<()> {
        let mut dirty = self.dirty.lock();
        if !*dirty {
            return Ok(());
        }

        let bytes = serde_json::to_vec_pretty(&*self.values.read())?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        *dirty = false;

        tracing::trace!(path = %self.path.display(), "flushed local store");
        Ok(())
    }
}

/// Fixed key layout of a progress record in a `LocalStore`
pub struct LocalProgress;

impl LocalProgress {
    /// Read the stored record. Negative counters clamp to zero and an
    /// out-of-range interval (including the 0.0 of a fresh install) resets
    /// to the default.
    pub fn load(store: &dyn LocalStore) -> ProgressRecord {
        ProgressRecord {
            score: store.get_int(KEY_SCORE).max(0) as u64,
            flowers_seen: store.get_int(KEY_FLOWERS_SEEN).max(0) as u64,
            interval: sanitize_interval(store.get_float(KEY_INTERVAL)),
            last_modified: RecordTime::from_millis(store.get_int(KEY_LAST_MODIFIED)),
        }
    }

    pub fn persist(store: &dyn LocalStore, record: &ProgressRecord) -> StoreResult<()> {
        store.set_int(KEY_SCORE, clamp_counter(record.score));
        store.set_int(KEY_FLOWERS_SEEN, clamp_counter(record.flowers_seen));
        store.set_float(KEY_INTERVAL, record.interval);
        store.set_int(KEY_LAST_MODIFIED, record.last_modified.as_millis());
        store.flush()
    }
}

fn clamp_counter(value: u64) -> i64 {
    value.min(i64::MAX as u64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use feelgood_core::DEFAULT_INTERVAL;

    #[test]
    fn test_memory_store_missing_keys_read_zero() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get_int("nope"), 0);
        assert_eq!(store.get_float("nope"), 0.0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_cross_type_reads() {
        let store = MemoryLocalStore::new();
        store.set_float("f", 2.9);
        store.set_int("i", 3);
        assert_eq!(store.get_int("f"), 2);
        assert_eq!(store.get_float("i"), 3.0);
    }

    #[test]
    fn test_fresh_install_loads_defaults() {
        let store = MemoryLocalStore::new();
        let record = LocalProgress::load(&store);

        assert_eq!(record.score, 0);
        assert_eq!(record.flowers_seen, 0);
        assert_eq!(record.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn test_load_clamps_stored_garbage() {
        let store = MemoryLocalStore::new();
        store.set_int(KEY_SCORE, -5);
        store.set_int(KEY_FLOWERS_SEEN, 3);
        store.set_float(KEY_INTERVAL, 7.5);

        let record = LocalProgress::load(&store);
        assert_eq!(record.score, 0);
        assert_eq!(record.flowers_seen, 3);
        assert_eq!(record.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn test_persist_then_load() {
        let store = MemoryLocalStore::new();
        let record = ProgressRecord::with_values(42, 4, 0.75, RecordTime::from_millis(99));

        LocalProgress::persist(&store, &record).unwrap();
        assert_eq!(LocalProgress::load(&store), record);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_json_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let store = JsonFileStore::open(&path).unwrap();
        let record = ProgressRecord::with_values(10, 1, 3.5, RecordTime::from_millis(5));
        LocalProgress::persist(&store, &record).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(LocalProgress::load(&reopened), record);
    }

    #[test]
    fn test_json_file_store_unflushed_writes_are_not_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set_int(KEY_SCORE, 8);
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get_int(KEY_SCORE), 0);
    }

    #[test]
    fn test_json_file_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(feelgood_core::StoreError::Json(_))
        ));
    }
}
