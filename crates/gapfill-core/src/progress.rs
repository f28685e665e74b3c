//! Progress persistence.
//!
//! Progress is one JSON string per dataset namespace in a flat key-value
//! store. Reads never fail hard: a missing or corrupt blob is no progress.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::scoring::AttemptRecord;

/// Prefix of every progress namespace key.
pub const NAMESPACE_PREFIX: &str = "gap_fill_progress_";

/// Hex digits of the origin digest kept in a namespace.
const DIGEST_CHARS: usize = 8;

/// Derive the storage namespace for a dataset origin.
///
/// The namespace is the sanitized file stem followed by a short digest of
/// the whole origin, so `unit1/set01.json` and `unit2/set01.json` map to
/// different keys. Query strings and fragments are ignored, so
/// `https://host/data/set01.json?v=2` shares progress with
/// `https://host/data/set01.json`.
pub fn namespace_for(origin: &str) -> String {
    let without_query = origin.split(&['?', '#'][..]).next().unwrap_or(origin);
    let normalized = without_query.replace('\\', "/");
    let file = normalized.rsplit('/').next().unwrap_or(&normalized);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{NAMESPACE_PREFIX}{stem}_{}", &digest[..DIGEST_CHARS])
}

// ---------------------------------------------------------------------------
// Key-value backends
// ---------------------------------------------------------------------------

/// A flat string store, one value per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let io = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io)?;
        std::fs::write(self.path_for(key), value).map_err(io)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    key: self.dir.display().to_string(),
                    source,
                })
            }
        };

        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-process store. Can be switched into a failing mode to exercise
/// write-failure handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("quota exceeded".into()));
        }
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Progress map
// ---------------------------------------------------------------------------

/// Attempt records of one dataset, keyed by set index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap {
    records: BTreeMap<usize, AttemptRecord>,
}

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, set_index: usize) -> Option<&AttemptRecord> {
        self.records.get(&set_index)
    }

    /// A set with any record is locked: the first attempt is permanent.
    pub fn is_locked(&self, set_index: usize) -> bool {
        self.records.contains_key(&set_index)
    }

    /// Store the first attempt for a set. Returns `false` and leaves the
    /// existing record untouched if one is already present.
    pub fn record_first(&mut self, set_index: usize, record: AttemptRecord) -> bool {
        if self.records.contains_key(&set_index) {
            return false;
        }
        self.records.insert(set_index, record);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &AttemptRecord)> {
        self.records.iter().map(|(idx, rec)| (*idx, rec))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Aggregate figures across the sets of a dataset.
    pub fn summary(&self, set_count: usize) -> ProgressSummary {
        let completed: Vec<&AttemptRecord> = self
            .records
            .iter()
            .filter(|(idx, _)| **idx < set_count)
            .map(|(_, rec)| rec)
            .collect();

        let average_percentage = if completed.is_empty() {
            0.0
        } else {
            completed.iter().map(|r| f64::from(r.percentage)).sum::<f64>() / completed.len() as f64
        };

        ProgressSummary {
            set_count,
            completed: completed.len(),
            perfect: completed.iter().filter(|r| r.is_perfect()).count(),
            correct: completed.iter().map(|r| r.correct).sum(),
            total: completed.iter().map(|r| r.total).sum(),
            average_percentage,
        }
    }
}

/// Aggregate progress across a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub set_count: usize,
    pub completed: usize,
    pub perfect: usize,
    pub correct: usize,
    pub total: usize,
    pub average_percentage: f64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Loads and saves a `ProgressMap` under one namespace.
#[derive(Clone)]
pub struct ProgressStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// A store for the dataset loaded from `origin`.
    pub fn for_origin(backend: Arc<dyn KeyValueStore>, origin: &str) -> Self {
        Self::new(backend, namespace_for(origin))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Load progress. Unreadable or corrupt data yields an empty map.
    pub fn load(&self) -> ProgressMap {
        let raw = match self.backend.get(&self.namespace) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressMap::new(),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "failed to read progress");
                return ProgressMap::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "ignoring corrupt progress data");
                ProgressMap::new()
            }
        }
    }

    pub fn save(&self, progress: &ProgressMap) -> Result<(), StorageError> {
        let json = serde_json::to_string(progress)?;
        self.backend.set(&self.namespace, &json)?;
        debug!(namespace = %self.namespace, sets = progress.len(), "progress saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(correct: usize, total: usize) -> AttemptRecord {
        AttemptRecord {
            correct,
            total,
            percentage: crate::scoring::percentage(correct, total),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            locked: true,
            responses: vec![],
        }
    }

    #[test]
    fn namespace_starts_with_file_stem() {
        let ns = namespace_for("data/set01.json");
        assert!(ns.starts_with("gap_fill_progress_set01_"));
        assert_eq!(ns.len(), "gap_fill_progress_set01_".len() + DIGEST_CHARS);
        assert!(namespace_for("a b/c d.json").starts_with("gap_fill_progress_c_d_"));
        assert!(namespace_for("learn").starts_with("gap_fill_progress_learn_"));
    }

    #[test]
    fn namespace_ignores_query_and_separator_style() {
        assert_eq!(
            namespace_for("https://example.com/data/set02.json?v=3"),
            namespace_for("https://example.com/data/set02.json")
        );
        assert_eq!(
            namespace_for("data\\set01.json"),
            namespace_for("data/set01.json")
        );
        assert_eq!(namespace_for("data/set01.json"), namespace_for("data/set01.json"));
    }

    #[test]
    fn different_origins_never_collide() {
        assert_ne!(namespace_for("data/set01.json"), namespace_for("data/set02.json"));
        assert_ne!(
            namespace_for("unit1/set01.json"),
            namespace_for("unit2/set01.json")
        );
        assert_ne!(namespace_for("c d.json"), namespace_for("c_d.json"));
    }

    #[test]
    fn first_record_wins() {
        let mut map = ProgressMap::new();
        assert!(map.record_first(0, record(2, 2)));
        assert!(!map.record_first(0, record(0, 2)));
        assert_eq!(map.get(0).unwrap().correct, 2);
        assert!(map.is_locked(0));
        assert!(!map.is_locked(1));
    }

    #[test]
    fn persisted_shape_uses_index_keys() {
        let mut map = ProgressMap::new();
        map.record_first(3, record(1, 2));
        let json: serde_json::Value = serde_json::to_value(&map).unwrap();
        let entry = &json["3"];
        assert_eq!(entry["correct"], 1);
        assert_eq!(entry["total"], 2);
        assert_eq!(entry["percentage"], 50);
        assert_eq!(entry["locked"], true);
        assert!(entry.get("responses").is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = ProgressStore::for_origin(Arc::new(MemoryStore::new()), "data/set01.json");
        let mut map = ProgressMap::new();
        map.record_first(0, record(2, 2));
        store.save(&map).unwrap();
        assert_eq!(store.load(), map);
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(&namespace_for("set01.json"), "{not json").unwrap();
        let store = ProgressStore::for_origin(backend, "set01.json");
        assert!(store.load().is_empty());
    }

    #[test]
    fn failing_store_reports_error() {
        let store = ProgressStore::new(Arc::new(MemoryStore::failing()), "ns");
        let mut map = ProgressMap::new();
        map.record_first(0, record(1, 1));
        assert!(matches!(store.save(&map), Err(StorageError::Unavailable(_))));
        assert!(store.load().is_empty());
    }

    #[test]
    fn file_store_writes_one_file_per_key() {
        let dir = TempDir::new().unwrap();
        let backend = FileStore::new(dir.path().join("progress"));
        assert_eq!(backend.get("missing").unwrap(), None);
        assert!(backend.keys().unwrap().is_empty());

        backend.set("gap_fill_progress_a", "{}").unwrap();
        backend.set("gap_fill_progress_b", "{}").unwrap();
        assert!(dir.path().join("progress/gap_fill_progress_a.json").exists());
        assert_eq!(
            backend.keys().unwrap(),
            vec!["gap_fill_progress_a", "gap_fill_progress_b"]
        );
    }

    #[test]
    fn summary_ignores_out_of_range_sets() {
        let mut map = ProgressMap::new();
        map.record_first(0, record(2, 2));
        map.record_first(1, record(1, 2));
        map.record_first(9, record(0, 2));
        let summary = map.summary(3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.perfect, 1);
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.total, 4);
        assert!((summary.average_percentage - 75.0).abs() < f64::EPSILON);
    }
}
