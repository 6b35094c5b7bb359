//! Durable progress store.
//!
//! Keyed by user id, merge-write semantics. `FileProgressStore` keeps one
//! JSON document per user and replaces it atomically; `MemoryProgressStore`
//! is for tests and dry runs.

use crate::error::{PitchError, Result};
use crate::levels::LevelTable;
use crate::progress::ProgressSnapshot;
use crate::record::{ProgressPatch, ProgressRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Longest accepted user id
pub const MAX_USER_ID_LEN: usize = 128;

/// Merge-write store for progress records
pub trait ProgressStore: Send + Sync {
    /// Read a user's record, `None` if the user has none yet
    fn load(&self, user_id: &str) -> Result<Option<ProgressRecord>>;

    /// Merge `patch` into the user's record, creating it if needed
    fn merge(&self, user_id: &str, patch: &ProgressPatch, at: DateTime<Utc>) -> Result<ProgressRecord>;
}

/// Load a user's snapshot, or defaults on first read
pub fn load_snapshot(
    store: &dyn ProgressStore,
    user_id: &str,
    table: &LevelTable,
) -> Result<ProgressSnapshot> {
    match store.load(user_id)? {
        Some(record) => record.to_snapshot(table),
        None => Ok(ProgressSnapshot::new()),
    }
}

/// User ids become file names, so keep them to a safe alphabet
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let ok = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(PitchError::InvalidUserId(user_id.to_string()))
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One JSON file per user under `<data_dir>/progress/`
pub struct FileProgressStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileProgressStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("progress"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{}.json", user_id)))
    }

    fn read(&self, path: &Path) -> Result<Option<ProgressRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        let path = self.path_for(user_id)?;
        self.read(&path)
    }

    fn merge(&self, user_id: &str, patch: &ProgressPatch, at: DateTime<Utc>) -> Result<ProgressRecord> {
        let path = self.path_for(user_id)?;
        let _guard = locked(&self.write_lock);

        let mut record = self.read(&path)?.unwrap_or_else(|| ProgressRecord::new(at));
        record.apply(patch, at);

        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&record)?)?;
        fs::rename(&tmp, &path)?;

        Ok(record)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<String, ProgressRecord>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        locked(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        validate_user_id(user_id)?;
        Ok(locked(&self.records).get(user_id).cloned())
    }

    fn merge(&self, user_id: &str, patch: &ProgressPatch, at: DateTime<Utc>) -> Result<ProgressRecord> {
        validate_user_id(user_id)?;
        let mut records = locked(&self.records);
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| ProgressRecord::new(at));
        record.apply(patch, at);
        Ok(record.clone())
    }
}
