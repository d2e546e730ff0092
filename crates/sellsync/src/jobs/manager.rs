//! Parse job manager: accepts input, runs extraction in the background and
//! answers polls.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tracing::Instrument;

use super::backend::{InMemoryJobBackend, JobBackend, SqliteJobBackend};
use super::model::{JobSource, JobStatus, ParseJob};
use super::sweeper::ExpirySweeper;
use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::config::{JobBackendKind, JobsConfig};
use crate::db::Database;
use crate::error::{JobError, SellsyncError};
use crate::extract::ItemExtractor;

/// Attempts at storing a terminal record before falling back.
const FINALIZE_ATTEMPTS: u32 = 3;
const FINALIZE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct JobManagerOptions {
    /// Extractions allowed to run at the same time.
    pub max_concurrent: usize,
    /// How long terminal jobs stay readable.
    pub retention: Duration,
}

impl Default for JobManagerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            retention: Duration::from_secs(3600),
        }
    }
}

impl From<&JobsConfig> for JobManagerOptions {
    fn from(config: &JobsConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            retention: config.retention(),
        }
    }
}

struct Inner {
    backend: Arc<dyn JobBackend>,
    extractor: Arc<dyn ItemExtractor>,
    events: JobEventBroadcaster,
    permits: Arc<Semaphore>,
    retention: Duration,
    shut_down: AtomicBool,
}

/// Cheap to clone; clones share the same jobs.
#[derive(Clone)]
pub struct ParseJobManager {
    inner: Arc<Inner>,
}

impl ParseJobManager {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        extractor: Arc<dyn ItemExtractor>,
        options: JobManagerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                extractor,
                events: JobEventBroadcaster::default(),
                permits: Arc::new(Semaphore::new(options.max_concurrent.max(1))),
                retention: options.retention,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Builds a manager whose backend follows `config.backend`.
    ///
    /// `namespace` scopes SQLite rows; `db` is reused when given so several
    /// managers can share one connection.
    pub fn from_config(
        config: &JobsConfig,
        extractor: Arc<dyn ItemExtractor>,
        namespace: &str,
        db: Option<Database>,
    ) -> Result<Self, SellsyncError> {
        let backend: Arc<dyn JobBackend> = match config.backend {
            JobBackendKind::Memory => Arc::new(InMemoryJobBackend::new()),
            JobBackendKind::Sqlite => {
                let db = match db {
                    Some(db) => db,
                    None => {
                        let path = config.resolved_database_path().ok_or_else(|| {
                            JobError::Backend("no database path for sqlite job backend".into())
                        })?;
                        Database::open(&path)?
                    }
                };
                Arc::new(SqliteJobBackend::new(db, namespace))
            }
        };

        Ok(Self::new(backend, extractor, JobManagerOptions::from(config)))
    }

    pub fn events(&self) -> &JobEventBroadcaster {
        &self.inner.events
    }

    /// Stores a pending job for `text` and schedules extraction. Returns the
    /// pending record without waiting for extraction.
    pub async fn create_job_from_text(&self, text: impl Into<String>) -> Result<ParseJob, JobError> {
        self.create_job(text.into(), JobSource::Text).await
    }

    /// Same as [`create_job_from_text`](Self::create_job_from_text) for text
    /// derived from an uploaded file.
    pub async fn create_job_from_buffer_text(
        &self,
        text: impl Into<String>,
    ) -> Result<ParseJob, JobError> {
        self.create_job(text.into(), JobSource::Buffer).await
    }

    /// Returns the current record. `None` means the id is unknown or the job
    /// has expired, which is distinct from a pending job.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<ParseJob>, JobError> {
        self.inner.backend.get(job_id).await
    }

    /// Starts a background task purging expired jobs every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> ExpirySweeper {
        ExpirySweeper::spawn(Arc::clone(&self.inner.backend), interval)
    }

    /// Refuses new jobs. Jobs still waiting for a permit end up `failed`;
    /// running extractions finish normally.
    pub fn shutdown(&self) {
        if !self.inner.shut_down.swap(true, Ordering::AcqRel) {
            info!("Parse job manager shutting down");
            self.inner.permits.close();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    async fn create_job(&self, input: String, source: JobSource) -> Result<ParseJob, JobError> {
        if self.is_shut_down() {
            return Err(JobError::ShutDown);
        }

        let job = ParseJob::pending(input, source);
        self.inner.backend.put(&job).await?;
        self.inner.events.send(JobEvent::queued(&job.job_id));
        debug!(
            "Queued parse job {} ({} bytes, {:?})",
            job.job_id,
            job.input.len(),
            source
        );

        let inner = Arc::clone(&self.inner);
        let pending = job.clone();
        tokio::spawn(async move { inner.run(pending).await });

        Ok(job)
    }
}

impl Inner {
    async fn run(self: Arc<Self>, job: ParseJob) {
        let span = tracing::info_span!("job.extract", job_id = %job.job_id);

        let terminal = async {
            let _permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return job.fail(JobError::ShutDown.to_string()),
            };

            let outcome = AssertUnwindSafe(self.extractor.extract_items(&job.input))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(items)) => job.complete(items),
                Ok(Err(e)) => job.fail(e.to_string()),
                Err(panic) => job.fail(format!(
                    "extraction panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        }
        .instrument(span)
        .await;

        match terminal {
            Ok(record) => self.finish(&job, record).await,
            Err(e) => error!("Parse job {} not finalized: {}", job.job_id, e),
        }
    }

    /// Stores `record` and announces it. A job must not stay pending, so when
    /// the store keeps refusing the record it falls back to a `failed`
    /// record, and failing that expires the pending row outright.
    async fn finish(&self, pending: &ParseJob, record: ParseJob) {
        let record = match self.store_terminal(&record).await {
            Ok(()) => record,
            Err(e) => {
                error!("Failed to store result of parse job {}: {}", record.job_id, e);
                match self.store_failure(pending, &record, &e).await {
                    Some(failed) => failed,
                    None => {
                        self.drop_pending(pending, &e).await;
                        return;
                    }
                }
            }
        };

        if let Err(e) = self.backend.expire(&record.job_id, self.retention).await {
            warn!("Failed to set retention on parse job {}: {}", record.job_id, e);
        }

        let event = match (&record.result, &record.error) {
            (Some(items), _) => {
                info!("Parse job {} done: {} item(s)", record.job_id, items.len());
                JobEvent::done(&record.job_id, items.len())
            }
            (None, error) => {
                let message = error.as_deref().unwrap_or("unknown error");
                warn!("Parse job {} failed: {}", record.job_id, message);
                JobEvent::failed(&record.job_id, message)
            }
        };
        self.events.send(event);
    }

    async fn store_terminal(&self, record: &ParseJob) -> Result<(), JobError> {
        let mut attempt = 1;
        loop {
            match self.backend.put(record).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= FINALIZE_ATTEMPTS => return Err(e),
                Err(e) => {
                    warn!(
                        "Storing parse job {} failed (attempt {}/{}): {}",
                        record.job_id, attempt, FINALIZE_ATTEMPTS, e
                    );
                    tokio::time::sleep(FINALIZE_BACKOFF * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Replaces a `done` record the store refused with a smaller `failed`
    /// one. `None` if that cannot be stored either.
    async fn store_failure(
        &self,
        pending: &ParseJob,
        refused: &ParseJob,
        cause: &JobError,
    ) -> Option<ParseJob> {
        if refused.status != JobStatus::Done {
            return None;
        }
        let failed = pending
            .fail(format!("could not store result: {}", cause))
            .ok()?;
        match self.store_terminal(&failed).await {
            Ok(()) => Some(failed),
            Err(e) => {
                error!("Failed to store failure of parse job {}: {}", failed.job_id, e);
                None
            }
        }
    }

    /// Last resort: pollers get "not found" instead of a job that is
    /// pending forever.
    async fn drop_pending(&self, pending: &ParseJob, cause: &JobError) {
        match self.backend.expire(&pending.job_id, Duration::ZERO).await {
            Ok(_) => warn!("Parse job {} dropped, its result could not be stored", pending.job_id),
            Err(e) => error!("Parse job {} could not be expired either: {}", pending.job_id, e),
        }
        self.events
            .send(JobEvent::failed(&pending.job_id, &cause.to_string()));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
