use std::time::Duration;

use crate::config::DraftsConfig;

/// Fixed backoff schedule for transient write failures.
///
/// The number of delays is the number of retries: a failing write is tried
/// `delays.len() + 1` times in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn no_retry() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    /// Delay before retry number `retry` (0-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: usize) -> Option<Duration> {
        self.delays.get(retry).copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ])
    }
}

impl From<&DraftsConfig> for RetryPolicy {
    fn from(config: &DraftsConfig) -> Self {
        Self::new(config.retry_delays())
    }
}
