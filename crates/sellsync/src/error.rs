use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SellsyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Draft sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors raised while turning raw text into line items.
///
/// The fallback extractor swallows all of these; they only surface from the
/// individual strategies and from custom `ItemExtractor` implementations.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("AI extraction is not configured")]
    NotConfigured,

    #[error("AI endpoint request failed: {0}")]
    Request(String),

    #[error("AI endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse AI response: {0}")]
    ResponseParse(String),

    #[error("AI response contained no usable items")]
    Empty,

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job backend error: {0}")]
    Backend(String),

    #[error("Failed to encode job record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Job {0} is already in a terminal state")]
    AlreadyTerminal(String),

    #[error("Job manager is shut down")]
    ShutDown,
}

impl From<crate::db::DatabaseError> for JobError {
    fn from(err: crate::db::DatabaseError) -> Self {
        JobError::Backend(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote draft store error: {0}")]
    Remote(#[from] crate::drafts::DraftApiError),

    #[error("Local snapshot error: {0}")]
    Snapshot(#[from] crate::drafts::SnapshotError),

    #[error("Controller for draft '{0}' is closed")]
    Closed(String),

    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, SellsyncError>;
