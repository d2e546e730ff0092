//! Client-side contract of the server draft API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{timestamp, RemoteDraft};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDraft {
    pub key: String,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftUpdate {
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Server reply to a create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAck {
    pub id: String,
    #[serde(with = "timestamp")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DraftApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Draft API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected draft API response: {0}")]
    Decode(String),
}

impl DraftApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DraftApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures, timeouts, 5xx, 408 and 429 are worth retrying.
    /// Every other status and undecodable replies are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            DraftApiError::Network(_) | DraftApiError::Timeout => true,
            DraftApiError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            DraftApiError::Decode(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn create_draft(&self, draft: &NewDraft) -> Result<DraftAck, DraftApiError>;

    async fn update_draft(&self, id: &str, update: &DraftUpdate)
        -> Result<DraftAck, DraftApiError>;

    async fn delete_draft(&self, id: &str) -> Result<(), DraftApiError>;

    /// Lists the server drafts stored under `key`.
    async fn get_drafts(&self, key: &str) -> Result<Vec<RemoteDraft>, DraftApiError>;
}
