//! Local snapshot storage, one entry per draft key.
//!
//! Entries are stored under `drafts-local-<key>`. Writes are synchronous so
//! the latest accepted state is on disk before the caller continues.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::model::DraftSnapshot;
use crate::config::DraftsConfig;
use crate::db::snapshot_repo::{self, SnapshotRow};
use crate::db::{Database, DatabaseError};

pub const STORAGE_KEY_PREFIX: &str = "drafts-local-";

pub fn storage_key(draft_key: &str) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, draft_key)
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Snapshot content is not valid JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait SnapshotStore: Send + Sync {
    fn load(&self, draft_key: &str) -> Result<Option<DraftSnapshot>, SnapshotError>;
    fn save(&self, draft_key: &str, snapshot: &DraftSnapshot) -> Result<(), SnapshotError>;
    /// Returns whether a snapshot existed.
    fn remove(&self, draft_key: &str) -> Result<bool, SnapshotError>;
}

/// Volatile store for tests and sessions without a snapshot file.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, DraftSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DraftSnapshot>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Snapshot store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, draft_key: &str) -> Result<Option<DraftSnapshot>, SnapshotError> {
        Ok(self.lock().get(&storage_key(draft_key)).cloned())
    }

    fn save(&self, draft_key: &str, snapshot: &DraftSnapshot) -> Result<(), SnapshotError> {
        self.lock().insert(storage_key(draft_key), snapshot.clone());
        Ok(())
    }

    fn remove(&self, draft_key: &str) -> Result<bool, SnapshotError> {
        Ok(self.lock().remove(&storage_key(draft_key)).is_some())
    }
}

pub struct SqliteSnapshotStore {
    db: Database,
}

impl SqliteSnapshotStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&self, draft_key: &str) -> Result<Option<DraftSnapshot>, SnapshotError> {
        let Some(row) = snapshot_repo::get(&self.db, &storage_key(draft_key))? else {
            return Ok(None);
        };
        Ok(Some(DraftSnapshot {
            draft_id: row.draft_id,
            content: serde_json::from_str(&row.content)?,
            updated_at: row.updated_at,
        }))
    }

    fn save(&self, draft_key: &str, snapshot: &DraftSnapshot) -> Result<(), SnapshotError> {
        let row = SnapshotRow {
            key: storage_key(draft_key),
            draft_id: snapshot.draft_id.clone(),
            content: serde_json::to_string(&snapshot.content)?,
            updated_at: snapshot.updated_at,
        };
        snapshot_repo::put(&self.db, &row)?;
        Ok(())
    }

    fn remove(&self, draft_key: &str) -> Result<bool, SnapshotError> {
        Ok(snapshot_repo::delete(&self.db, &storage_key(draft_key))?)
    }
}

/// SQLite-backed when `snapshot_path` is set, in-memory otherwise.
pub fn snapshot_store_from_config(
    config: &DraftsConfig,
) -> Result<Arc<dyn SnapshotStore>, SnapshotError> {
    match config.snapshot_path.as_deref() {
        Some(path) => {
            let db = Database::open(Path::new(path))?;
            Ok(Arc::new(SqliteSnapshotStore::new(db)))
        }
        None => Ok(Arc::new(MemorySnapshotStore::new())),
    }
}
