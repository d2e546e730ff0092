//! Single-slot outbox for one draft key.
//!
//! At most one entry is pending. A save replaces whatever is pending, a
//! delete replaces any pending save. Every change bumps the revision so the
//! processor can tell whether the entry it just wrote is still the latest.

use serde_json::Value;

use super::model::{is_server_id, OutboxEntry, OutboxOp};

#[derive(Debug, Default)]
pub struct Outbox {
    pending: Option<OutboxEntry>,
    revision: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `payload`, replacing any pending entry.
    pub fn enqueue_save(&mut self, payload: Value, draft_id: Option<&str>) {
        let (op, id) = if is_server_id(draft_id) {
            (OutboxOp::Update, draft_id.map(str::to_string))
        } else {
            (OutboxOp::Create, None)
        };
        self.replace(OutboxEntry {
            op,
            id,
            payload: Some(payload),
            attempts: 0,
        });
    }

    /// Queues a delete, superseding any pending save.
    pub fn enqueue_delete(&mut self, draft_id: Option<&str>) {
        self.replace(OutboxEntry {
            op: OutboxOp::Delete,
            id: draft_id.map(str::to_string),
            payload: None,
            attempts: 0,
        });
    }

    fn replace(&mut self, entry: OutboxEntry) {
        self.pending = Some(entry);
        self.revision += 1;
    }

    pub fn pending(&self) -> Option<&OutboxEntry> {
        self.pending.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copy of the pending entry with its op resolved against the draft id
    /// bound right now, plus the revision it belongs to.
    pub fn next(&self, bound_id: Option<&str>) -> Option<(OutboxEntry, u64)> {
        let mut entry = self.pending.clone()?;
        let server_id = bound_id
            .filter(|id| is_server_id(Some(id)))
            .or(entry.id.as_deref().filter(|id| is_server_id(Some(id))))
            .map(str::to_string);

        match entry.op {
            OutboxOp::Delete => entry.id = server_id,
            OutboxOp::Create | OutboxOp::Update => {
                entry.op = if server_id.is_some() {
                    OutboxOp::Update
                } else {
                    OutboxOp::Create
                };
                entry.id = server_id;
            }
        }
        Some((entry, self.revision))
    }

    pub fn record_attempts(&mut self, revision: u64, attempts: u32) {
        if self.revision == revision {
            if let Some(entry) = self.pending.as_mut() {
                entry.attempts = attempts;
            }
        }
    }

    /// Clears the pending entry if nothing newer arrived since `revision`.
    /// Returns whether it was cleared.
    pub fn settle(&mut self, revision: u64) -> bool {
        if self.revision != revision {
            return false;
        }
        self.pending = None;
        true
    }

    /// Drops the pending entry unconditionally.
    pub fn clear(&mut self) {
        if self.pending.take().is_some() {
            self.revision += 1;
        }
    }
}
