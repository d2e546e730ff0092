//! Event streaming for UI layers that prefer push over polling.

pub mod job_events;

pub use job_events::{JobEvent, JobEventBroadcaster, JobEventKind};
