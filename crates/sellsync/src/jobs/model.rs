use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;
use crate::extract::ParsedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the job's input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    /// Pasted or submitted text.
    Text,
    /// Text derived from an uploaded file.
    Buffer,
}

/// A parse job record. Once `status` is terminal the record never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseJob {
    pub job_id: String,
    pub status: JobStatus,
    pub source: JobSource,
    pub input: String,
    /// Present only when `status` is `done`.
    pub result: Option<Vec<ParsedItem>>,
    /// Present only when `status` is `failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ParseJob {
    pub fn pending(input: String, source: JobSource) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            source,
            input,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Returns the `done` version of this record.
    pub fn complete(&self, items: Vec<ParsedItem>) -> Result<Self, JobError> {
        self.ensure_pending()?;
        Ok(Self {
            status: JobStatus::Done,
            result: Some(items),
            error: None,
            completed_at: Some(Utc::now()),
            ..self.clone()
        })
    }

    /// Returns the `failed` version of this record.
    pub fn fail(&self, error: impl Into<String>) -> Result<Self, JobError> {
        self.ensure_pending()?;
        Ok(Self {
            status: JobStatus::Failed,
            result: None,
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..self.clone()
        })
    }

    fn ensure_pending(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::AlreadyTerminal(self.job_id.clone()));
        }
        Ok(())
    }
}
