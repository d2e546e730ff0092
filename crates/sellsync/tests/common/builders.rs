//! Builders for test configuration.

#![allow(dead_code)]

use sellsync::config::{AiConfig, Config, DraftsConfig, JobBackendKind, JobsConfig, LoggingConfig};

pub struct ConfigBuilder {
    jobs: JobsConfig,
    ai: AiConfig,
    drafts: DraftsConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            jobs: JobsConfig {
                max_concurrent: 2,
                ..Default::default()
            },
            ai: AiConfig::default(),
            drafts: DraftsConfig::default(),
        }
    }

    pub fn sqlite_jobs(mut self, path: &std::path::Path) -> Self {
        self.jobs.backend = JobBackendKind::Sqlite;
        self.jobs.database_path = Some(path.to_string_lossy().into_owned());
        self
    }

    pub fn sync_threshold(mut self, bytes: usize) -> Self {
        self.jobs.sync_parse_max_bytes = bytes;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.drafts.debounce_ms = ms;
        self
    }

    pub fn retry_delays_ms(mut self, delays: Vec<u64>) -> Self {
        self.drafts.retry_delays_ms = delays;
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: "1.0".to_string(),
            jobs: self.jobs,
            ai: self.ai,
            drafts: self.drafts,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
