//! Job record storage.
//!
//! [`JobBackend`] is the only thing the manager knows about storage. Records
//! are written whole, so a reader sees either the old or the new record and
//! never a mix.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::model::ParseJob;
use crate::db::{job_repo, Database};
use crate::error::JobError;

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Stores `job`, replacing any earlier record with the same id.
    async fn put(&self, job: &ParseJob) -> Result<(), JobError>;

    /// Returns the record, or `None` when unknown or expired.
    async fn get(&self, job_id: &str) -> Result<Option<ParseJob>, JobError>;

    async fn delete(&self, job_id: &str) -> Result<bool, JobError>;

    /// Schedules the record to disappear after `ttl`. Returns whether it exists.
    async fn expire(&self, job_id: &str, ttl: Duration) -> Result<bool, JobError>;

    /// Drops every expired record. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, JobError>;
}

struct Entry {
    job: ParseJob,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local map. Lost on restart.
#[derive(Default)]
pub struct InMemoryJobBackend {
    jobs: RwLock<HashMap<String, Entry>>,
}

impl InMemoryJobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[async_trait]
impl JobBackend for InMemoryJobBackend {
    async fn put(&self, job: &ParseJob) -> Result<(), JobError> {
        let mut jobs = self.write();
        let expires_at = jobs.get(&job.job_id).and_then(|e| e.expires_at);
        jobs.insert(
            job.job_id.clone(),
            Entry {
                job: job.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<ParseJob>, JobError> {
        let now = Instant::now();
        Ok(self
            .read()
            .get(job_id)
            .filter(|e| e.is_live(now))
            .map(|e| e.job.clone()))
    }

    async fn delete(&self, job_id: &str) -> Result<bool, JobError> {
        Ok(self.write().remove(job_id).is_some())
    }

    async fn expire(&self, job_id: &str, ttl: Duration) -> Result<bool, JobError> {
        match self.write().get_mut(job_id) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<usize, JobError> {
        let now = Instant::now();
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, e| e.is_live(now));
        Ok(before - jobs.len())
    }
}

/// SQLite-backed store shared across processes using the same file.
///
/// Rows are keyed `<namespace>/<job_id>` so tenants sharing one database
/// never see each other's jobs.
pub struct SqliteJobBackend {
    db: Database,
    namespace: String,
}

impl SqliteJobBackend {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    fn row_id(&self, job_id: &str) -> String {
        format!("{}/{}", self.namespace, job_id)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl JobBackend for SqliteJobBackend {
    async fn put(&self, job: &ParseJob) -> Result<(), JobError> {
        let row = job_repo::JobRow {
            id: self.row_id(&job.job_id),
            status: job.status.as_str().to_string(),
            record: serde_json::to_string(job)?,
            created_at: job.created_at.to_rfc3339(),
            expires_at: None,
        };
        job_repo::upsert(&self.db, &row)?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<ParseJob>, JobError> {
        let Some(row) = job_repo::find_live(&self.db, &self.row_id(job_id), Self::now_ms())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&row.record)?))
    }

    async fn delete(&self, job_id: &str) -> Result<bool, JobError> {
        Ok(job_repo::delete(&self.db, &self.row_id(job_id))?)
    }

    async fn expire(&self, job_id: &str, ttl: Duration) -> Result<bool, JobError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let at = Self::now_ms().saturating_add(ttl_ms);
        Ok(job_repo::set_expiry(&self.db, &self.row_id(job_id), at)?)
    }

    async fn purge_expired(&self) -> Result<usize, JobError> {
        Ok(job_repo::purge_expired(&self.db, Self::now_ms())?)
    }
}
