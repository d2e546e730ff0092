//! Parse-job lifecycle events for push-style consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: String,
    pub kind: JobEventKind,
    /// Number of extracted items (done only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn queued(job_id: &str) -> Self {
        Self::new(job_id, JobEventKind::Queued)
    }

    pub fn done(job_id: &str, item_count: usize) -> Self {
        Self {
            item_count: Some(item_count),
            ..Self::new(job_id, JobEventKind::Done)
        }
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, JobEventKind::Failed)
        }
    }

    fn new(job_id: &str, kind: JobEventKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
            item_count: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = JobEventBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobEvent::queued("j1"));
        broadcaster.send(JobEvent::done("j1", 3));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, JobEventKind::Queued);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, JobEventKind::Done);
        assert_eq!(second.item_count, Some(3));
    }

    #[test]
    fn test_send_without_subscribers_is_noop() {
        JobEventBroadcaster::new(4).send(JobEvent::failed("j2", "boom"));
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let value = serde_json::to_value(JobEvent::queued("j3")).unwrap();
        assert_eq!(value["kind"], "queued");
        assert!(value.get("error").is_none());
        assert!(value.get("item_count").is_none());
    }
}
