//! Parse submission and job polling.
//!
//! Small inputs are parsed inline; anything above the sync threshold becomes
//! a background job the client polls.

use log::{debug, error};
use serde::Serialize;

use super::ApiResponse;
use crate::config::Config;
use crate::db::Database;
use crate::error::SellsyncError;
use crate::extract::{FallbackExtractor, ParsedItem};
use crate::jobs::{JobStatus, ParseJob, ParseJobManager};
use crate::processor::TextSourceRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted {
    pub status: String,
    pub job_id: String,
}

/// Serializes as a bare item array or as `{"status": "accepted", "job_id": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmitOutcome {
    Items(Vec<ParsedItem>),
    Accepted(Accepted),
}

/// What a poll returns. `result` and `error` are always present, `null`
/// when not applicable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub result: Option<Vec<ParsedItem>>,
    pub error: Option<String>,
}

impl From<ParseJob> for JobView {
    fn from(job: ParseJob) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            result: job.result,
            error: job.error,
        }
    }
}

pub struct ParseApi {
    manager: ParseJobManager,
    extractor: FallbackExtractor,
    sources: TextSourceRegistry,
    sync_max_bytes: usize,
}

impl ParseApi {
    pub fn new(manager: ParseJobManager, extractor: FallbackExtractor, sync_max_bytes: usize) -> Self {
        Self {
            manager,
            extractor,
            sources: TextSourceRegistry::new(),
            sync_max_bytes,
        }
    }

    /// Wires extractor and job manager from `config`. Jobs are stored under
    /// `namespace`.
    pub fn from_config(
        config: &Config,
        namespace: &str,
        db: Option<Database>,
    ) -> Result<Self, SellsyncError> {
        let extractor = FallbackExtractor::from_config(&config.ai)?;
        let manager = ParseJobManager::from_config(
            &config.jobs,
            std::sync::Arc::new(extractor.clone()),
            namespace,
            db,
        )?;
        Ok(Self::new(manager, extractor, config.jobs.sync_parse_max_bytes))
    }

    pub fn with_sources(mut self, sources: TextSourceRegistry) -> Self {
        self.sources = sources;
        self
    }

    pub fn manager(&self) -> &ParseJobManager {
        &self.manager
    }

    pub async fn submit_text(&self, text: &str) -> ApiResponse<SubmitOutcome> {
        if text.len() <= self.sync_max_bytes {
            debug!("Parsing {} bytes inline", text.len());
            return ApiResponse::ok(SubmitOutcome::Items(self.extractor.extract_ai(text).await));
        }

        match self.manager.create_job_from_text(text).await {
            Ok(job) => ApiResponse::ok(accepted(job)),
            Err(e) => {
                error!("Failed to queue parse job: {}", e);
                ApiResponse::err(e.to_string())
            }
        }
    }

    /// Converts an upload to text, then applies the same size policy as
    /// [`submit_text`](Self::submit_text).
    pub async fn submit_file(&self, bytes: &[u8], filename: &str) -> ApiResponse<SubmitOutcome> {
        let text = match self.sources.to_text(bytes, filename) {
            Ok(text) => text,
            Err(e) => return ApiResponse::err(e.to_string()),
        };

        if text.len() <= self.sync_max_bytes {
            return ApiResponse::ok(SubmitOutcome::Items(self.extractor.extract_ai(&text).await));
        }

        match self.manager.create_job_from_buffer_text(text).await {
            Ok(job) => ApiResponse::ok(accepted(job)),
            Err(e) => {
                error!("Failed to queue parse job for '{}': {}", filename, e);
                ApiResponse::err(e.to_string())
            }
        }
    }

    /// Idempotent: polling a terminal job always returns the same view.
    pub async fn get_job(&self, job_id: &str) -> ApiResponse<JobView> {
        match self.manager.get_job(job_id).await {
            Ok(Some(job)) => ApiResponse::ok(JobView::from(job)),
            Ok(None) => ApiResponse::err(format!("Job '{}' not found", job_id)),
            Err(e) => ApiResponse::err(e.to_string()),
        }
    }
}

fn accepted(job: ParseJob) -> SubmitOutcome {
    SubmitOutcome::Accepted(Accepted {
        status: "accepted".to_string(),
        job_id: job.job_id,
    })
}
