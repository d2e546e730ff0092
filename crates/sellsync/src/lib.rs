pub mod api;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod drafts;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod logging;
pub mod processor;
pub mod secrets;

pub use api::{ApiResponse, ParseApi};
pub use broadcast::{JobEvent, JobEventBroadcaster};
pub use config::{load_config, Config};
pub use drafts::{AutosaveController, AutosaveOptions, DraftStore, HttpDraftStore, SaveStatus};
pub use error::{ConfigError, ExtractError, JobError, Result, SellsyncError, SyncError};
pub use extract::{FallbackExtractor, ItemExtractor, ParsedItem};
pub use jobs::{JobManagerRegistry, ParseJob, ParseJobManager};
pub use secrets::{resolve_api_key, SecretError};
