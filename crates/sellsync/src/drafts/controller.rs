//! Autosave controller for a single draft key.
//!
//! Edits land in the local snapshot immediately and in a one-slot outbox.
//! A debounce timer, or an explicit flush, starts the processor, which
//! drains the outbox one write at a time. At most one remote write per key
//! is in flight; edits made meanwhile replace the pending payload and are
//! picked up once the current write resolves.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::Instrument;

use super::model::{
    now_millis, DraftConflict, DraftSnapshot, OutboxEntry, OutboxOp, RemoteDraft,
};
use super::outbox::Outbox;
use super::remote::{DraftAck, DraftApiError, DraftStore, DraftUpdate, NewDraft};
use super::retry::RetryPolicy;
use super::snapshot::SnapshotStore;
use crate::config::DraftsConfig;
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone)]
pub struct AutosaveOptions {
    pub debounce: Duration,
    pub retry: RetryPolicy,
    /// Sent along with every create and update.
    pub metadata: Option<Value>,
}

impl Default for AutosaveOptions {
    fn default() -> Self {
        Self::from(&DraftsConfig::default())
    }
}

impl From<&DraftsConfig> for AutosaveOptions {
    fn from(config: &DraftsConfig) -> Self {
        Self {
            debounce: config.debounce(),
            retry: RetryPolicy::from(config),
            metadata: None,
        }
    }
}

struct State {
    snapshot: DraftSnapshot,
    outbox: Outbox,
    in_flight: bool,
    /// Bumped by every edit; a debounce timer only fires if it still matches.
    debounce_epoch: u64,
    /// Bumped by `adopt_remote`. An ack for a write sent before the bump
    /// belongs to a draft the user no longer holds.
    adoptions: u64,
    closed: bool,
    last_error: Option<DraftApiError>,
}

enum Written {
    Saved(DraftAck),
    Deleted,
}

struct Shared {
    key: String,
    remote: Arc<dyn DraftStore>,
    snapshots: Arc<dyn SnapshotStore>,
    options: AutosaveOptions,
    runtime: Handle,
    state: Mutex<State>,
    status: watch::Sender<SaveStatus>,
}

/// Cheap to clone; clones drive the same draft.
#[derive(Clone)]
pub struct AutosaveController {
    shared: Arc<Shared>,
}

impl AutosaveController {
    /// Loads the local snapshot for `key` and checks the server for newer
    /// drafts. `on_conflict` runs at most once, with the newest server draft
    /// whose `updated_at` is strictly later than the local snapshot's.
    ///
    /// A failing server listing is logged and otherwise ignored.
    pub async fn mount<F>(
        key: impl Into<String>,
        remote: Arc<dyn DraftStore>,
        snapshots: Arc<dyn SnapshotStore>,
        options: AutosaveOptions,
        on_conflict: F,
    ) -> Result<Self, SyncError>
    where
        F: FnOnce(DraftConflict),
    {
        let key = key.into();
        let runtime = Handle::try_current().map_err(|e| SyncError::Runtime(e.to_string()))?;

        let local = snapshots.load(&key)?;
        let local_updated_at = local.as_ref().map_or(0, |s| s.updated_at);

        match remote.get_drafts(&key).await {
            Ok(drafts) => {
                let newest = drafts
                    .into_iter()
                    .filter(|d| d.updated_at > local_updated_at)
                    .max_by_key(|d| d.updated_at);
                if let Some(remote_draft) = newest {
                    info!(
                        "Server draft {} for '{}' is newer than the local copy",
                        remote_draft.id, key
                    );
                    on_conflict(DraftConflict {
                        key: key.clone(),
                        local: local.clone(),
                        remote: remote_draft,
                    });
                }
            }
            Err(e) => warn!("Could not list server drafts for '{}': {}", key, e),
        }

        let (status, _) = watch::channel(SaveStatus::Idle);
        Ok(Self {
            shared: Arc::new(Shared {
                key,
                remote,
                snapshots,
                options,
                runtime,
                state: Mutex::new(State {
                    snapshot: local.unwrap_or_else(DraftSnapshot::empty),
                    outbox: Outbox::new(),
                    in_flight: false,
                    debounce_epoch: 0,
                    adoptions: 0,
                    closed: false,
                    last_error: None,
                }),
                status,
            }),
        })
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Records new content and restarts the debounce timer. Never waits on
    /// the network. The error only reports a failed local snapshot write;
    /// the edit is queued either way.
    pub fn set_content(&self, content: Value) -> Result<(), SyncError> {
        let (epoch, persisted) = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(SyncError::Closed(self.shared.key.clone()));
            }

            state.snapshot.content = content.clone();
            state.snapshot.updated_at = now_millis();
            let draft_id = state.snapshot.server_id().map(str::to_string);
            state.outbox.enqueue_save(content, draft_id.as_deref());
            state.debounce_epoch += 1;

            let persisted = self.shared.snapshots.save(&self.shared.key, &state.snapshot);
            (state.debounce_epoch, persisted)
        };

        self.schedule(epoch);
        persisted.map_err(|e| {
            warn!("Failed to persist snapshot for '{}': {}", self.shared.key, e);
            SyncError::from(e)
        })
    }

    /// Queues a delete and processes it right away. A draft the server has
    /// never seen is only removed locally.
    pub async fn delete(&self) -> Result<(), SyncError> {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(SyncError::Closed(self.shared.key.clone()));
            }
            let draft_id = state.snapshot.draft_id.clone();
            state.outbox.enqueue_delete(draft_id.as_deref());
            state.debounce_epoch += 1;
        }
        self.drive().await
    }

    /// Skips the debounce and writes whatever is pending, including an entry
    /// left behind by an earlier error. Resolves once the processor is idle.
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.shared.lock().debounce_epoch += 1;
        self.drive().await
    }

    /// Replaces local state with a server draft, dropping any pending write.
    /// Nothing is sent to the server.
    pub fn adopt_remote(&self, draft: RemoteDraft) -> Result<(), SyncError> {
        let mut state = self.shared.lock();
        state.snapshot = DraftSnapshot {
            draft_id: Some(draft.id),
            content: draft.content,
            updated_at: draft.updated_at,
        };
        state.outbox.clear();
        state.debounce_epoch += 1;
        state.adoptions += 1;
        state.last_error = None;
        if !state.in_flight {
            self.shared.status.send_replace(SaveStatus::Saved);
        }
        self.shared.snapshots.save(&self.shared.key, &state.snapshot)?;
        Ok(())
    }

    /// Stops pending debounce timers and rejects further edits. A write
    /// already sent keeps running to completion.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        state.closed = true;
        state.debounce_epoch += 1;
        debug!("Autosave for '{}' closed", self.shared.key);
    }

    pub fn status(&self) -> SaveStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    pub fn draft_id(&self) -> Option<String> {
        self.shared.lock().snapshot.draft_id.clone()
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        self.shared.lock().snapshot.clone()
    }

    pub fn pending_entry(&self) -> Option<OutboxEntry> {
        self.shared.lock().outbox.pending().cloned()
    }

    pub fn last_error(&self) -> Option<DraftApiError> {
        self.shared.lock().last_error.clone()
    }

    fn schedule(&self, epoch: u64) {
        let shared = Arc::clone(&self.shared);
        let delay = shared.options.debounce;
        self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let due = {
                let state = shared.lock();
                !state.closed && state.debounce_epoch == epoch
            };
            if due {
                Shared::start(&shared);
            }
        });
    }

    async fn drive(&self) -> Result<(), SyncError> {
        Shared::start(&self.shared);
        self.wait_until_settled().await;
        match (self.status(), self.last_error()) {
            (SaveStatus::Error, Some(e)) => Err(SyncError::Remote(e)),
            _ => Ok(()),
        }
    }

    async fn wait_until_settled(&self) {
        let mut rx = self.shared.status.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status != SaveStatus::Saving {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Autosave state lock for '{}' was poisoned, recovering", self.key);
                poisoned.into_inner()
            }
        }
    }

    /// Claims the processor and drains the outbox on a task of its own, so
    /// a caller that stops waiting cannot cut a write short. No-op while a
    /// drain is running or when nothing is queued.
    fn start(shared: &Arc<Shared>) {
        {
            let mut state = shared.lock();
            if state.in_flight || state.outbox.is_empty() {
                return;
            }
            state.in_flight = true;
            state.last_error = None;
            shared.status.send_replace(SaveStatus::Saving);
        }

        let span = tracing::info_span!("drafts.drain", key = %shared.key);
        let drainer = Arc::clone(shared);
        shared
            .runtime
            .spawn(async move { drainer.drain().await }.instrument(span));
    }

    async fn drain(&self) {
        let mut last_op = OutboxOp::Update;
        loop {
            let (entry, revision, adoptions) = {
                let mut state = self.lock();
                match state.outbox.next(state.snapshot.server_id()) {
                    Some((entry, revision)) => (entry, revision, state.adoptions),
                    None => {
                        state.in_flight = false;
                        let status = if last_op == OutboxOp::Delete {
                            SaveStatus::Idle
                        } else {
                            SaveStatus::Saved
                        };
                        self.status.send_replace(status);
                        return;
                    }
                }
            };
            last_op = entry.op;

            match self.write_with_retry(&entry, revision).await {
                Ok(Written::Saved(ack)) => self.apply_saved(ack, revision, adoptions),
                Ok(Written::Deleted) => self.apply_deleted(revision, adoptions),
                Err(e) => {
                    error!(
                        "Giving up on {:?} for draft '{}': {}",
                        entry.op, self.key, e
                    );
                    let mut state = self.lock();
                    state.last_error = Some(e);
                    state.in_flight = false;
                    self.status.send_replace(SaveStatus::Error);
                    return;
                }
            }
        }
    }

    async fn write_with_retry(
        &self,
        entry: &OutboxEntry,
        revision: u64,
    ) -> Result<Written, DraftApiError> {
        let mut retry = 0usize;
        loop {
            match self.write(entry).await {
                Ok(written) => return Ok(written),
                Err(e) if e.is_transient() => {
                    let Some(delay) = self.options.retry.delay_for(retry) else {
                        return Err(e);
                    };
                    retry += 1;
                    warn!(
                        "{:?} for draft '{}' failed ({}), retry {}/{} in {:?}",
                        entry.op,
                        self.key,
                        e,
                        retry,
                        self.options.retry.max_retries(),
                        delay
                    );
                    self.lock()
                        .outbox
                        .record_attempts(revision, u32::try_from(retry).unwrap_or(u32::MAX));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn write(&self, entry: &OutboxEntry) -> Result<Written, DraftApiError> {
        let content = entry.payload.clone().unwrap_or(Value::Null);
        let metadata = self.options.metadata.clone();

        match (entry.op, entry.id.as_deref()) {
            (OutboxOp::Delete, None) => {
                debug!("Draft '{}' was never created remotely, deleting locally", self.key);
                Ok(Written::Deleted)
            }
            (OutboxOp::Delete, Some(id)) => match self.remote.delete_draft(id).await {
                Ok(()) => Ok(Written::Deleted),
                Err(e) if e.is_not_found() => {
                    debug!("Draft {} already gone on the server", id);
                    Ok(Written::Deleted)
                }
                Err(e) => Err(e),
            },
            (OutboxOp::Update, Some(id)) => self
                .remote
                .update_draft(id, &DraftUpdate { content, metadata })
                .await
                .map(Written::Saved),
            (OutboxOp::Create | OutboxOp::Update, _) => self
                .remote
                .create_draft(&NewDraft {
                    key: self.key.clone(),
                    content,
                    metadata,
                })
                .await
                .map(Written::Saved),
        }
    }

    fn apply_saved(&self, ack: DraftAck, revision: u64, adoptions: u64) {
        let mut state = self.lock();
        if state.adoptions != adoptions {
            info!(
                "Draft '{}' adopted a server copy while {} was being written, keeping the adopted id",
                self.key, ack.id
            );
            return;
        }
        if state.snapshot.draft_id.as_deref() != Some(ack.id.as_str()) {
            info!("Draft '{}' bound to server id {}", self.key, ack.id);
        }
        state.snapshot.draft_id = Some(ack.id);
        state.snapshot.updated_at = state.snapshot.updated_at.max(ack.updated_at);
        state.outbox.settle(revision);

        if let Err(e) = self.snapshots.save(&self.key, &state.snapshot) {
            warn!("Failed to persist snapshot for '{}': {}", self.key, e);
        }
    }

    fn apply_deleted(&self, revision: u64, adoptions: u64) {
        let mut state = self.lock();
        if state.adoptions != adoptions {
            info!("Draft '{}' adopted a server copy during delete, keeping it", self.key);
            return;
        }
        if state.outbox.settle(revision) {
            state.snapshot = DraftSnapshot::empty();
            if let Err(e) = self.snapshots.remove(&self.key) {
                warn!("Failed to remove snapshot for '{}': {}", self.key, e);
            }
        } else {
            // Edited again after the delete was queued: keep the content,
            // the next write recreates the draft.
            state.snapshot.draft_id = None;
            if let Err(e) = self.snapshots.save(&self.key, &state.snapshot) {
                warn!("Failed to persist snapshot for '{}': {}", self.key, e);
            }
        }
        info!("Draft '{}' deleted", self.key);
    }
}
