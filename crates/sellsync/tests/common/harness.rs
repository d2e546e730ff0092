//! Isolated environment for draft and job tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use sellsync::db::Database;
use sellsync::drafts::{
    AutosaveController, AutosaveOptions, DraftConflict, DraftSnapshot, SnapshotStore,
    SqliteSnapshotStore,
};

use super::mocks::MockDraftStore;

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub remote: Arc<MockDraftStore>,
    pub snapshots: Arc<SqliteSnapshotStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("sellsync.db"))
            .expect("Failed to open test database");

        Self {
            snapshots: Arc::new(SqliteSnapshotStore::new(db.clone())),
            remote: Arc::new(MockDraftStore::new()),
            db,
            temp_dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Stores a snapshot as if an earlier session had left it behind.
    pub fn seed_snapshot(&self, key: &str, draft_id: Option<&str>, content: Value, updated_at: i64) {
        let snapshot = DraftSnapshot {
            draft_id: draft_id.map(str::to_string),
            content,
            updated_at,
        };
        self.snapshots
            .save(key, &snapshot)
            .expect("Failed to seed snapshot");
    }

    pub fn stored_snapshot(&self, key: &str) -> Option<DraftSnapshot> {
        self.snapshots.load(key).expect("Failed to read snapshot")
    }

    pub async fn mount(&self, key: &str) -> AutosaveController {
        self.mount_with(key, AutosaveOptions::default(), |conflict| {
            panic!("unexpected conflict: {:?}", conflict)
        })
        .await
    }

    pub async fn mount_with<F>(&self, key: &str, options: AutosaveOptions, on_conflict: F) -> AutosaveController
    where
        F: FnOnce(DraftConflict),
    {
        AutosaveController::mount(
            key,
            self.remote.clone(),
            self.snapshots.clone(),
            options,
            on_conflict,
        )
        .await
        .expect("Failed to mount autosave controller")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
