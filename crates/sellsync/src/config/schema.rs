use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Inputs up to this many bytes are parsed inline; larger ones become jobs.
pub const DEFAULT_SYNC_PARSE_MAX_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub drafts: DraftsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            jobs: JobsConfig::default(),
            ai: AiConfig::default(),
            drafts: DraftsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobBackendKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_backend")]
    pub backend: JobBackendKind,
    /// SQLite file for the `sqlite` backend. Falls back to `default_database_path()`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// How long terminal jobs stay pollable.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_sync_parse_max_bytes")]
    pub sync_parse_max_bytes: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_backend() -> JobBackendKind {
    JobBackendKind::Memory
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

fn default_sync_parse_max_bytes() -> usize {
    DEFAULT_SYNC_PARSE_MAX_BYTES
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl JobsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Resolves the SQLite path, falling back to the per-user default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: None,
            retention_secs: default_retention_secs(),
            max_concurrent: default_max_concurrent(),
            sync_parse_max_bytes: default_sync_parse_max_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Settings for the AI-assisted extractor.
///
/// The key is resolved from `api_key`, then `api_key_file`, then
/// `api_key_env_var`. No key at all is a valid setup: extraction then runs
/// the heuristic parser only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("SELLSYNC_AI_API_KEY".to_string())
}

fn default_ai_timeout() -> u64 {
    30
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_ai_endpoint(),
            model: default_ai_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftsConfig {
    /// Base URL of the remote draft API, e.g. `https://shop.example/api`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay before each retry of a transient failure; its length is the retry cap.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
    /// SQLite file holding local snapshots. Memory-only when unset.
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![2000, 4000, 8000]
}

fn default_request_timeout() -> u64 {
    30
}

impl DraftsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            debounce_ms: default_debounce_ms(),
            retry_delays_ms: default_retry_delays_ms(),
            snapshot_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
