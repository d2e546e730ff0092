//! Draft autosave: local snapshots, a one-slot outbox per key and a
//! single-flight processor writing to the remote draft store.

pub mod controller;
pub mod http;
pub mod model;
pub mod outbox;
pub mod remote;
pub mod retry;
pub mod snapshot;

pub use controller::{AutosaveController, AutosaveOptions, SaveStatus};
pub use http::HttpDraftStore;
pub use model::{DraftConflict, DraftSnapshot, OutboxEntry, OutboxOp, RemoteDraft};
pub use outbox::Outbox;
pub use remote::{DraftAck, DraftApiError, DraftStore, DraftUpdate, NewDraft};
pub use retry::RetryPolicy;
pub use snapshot::{
    snapshot_store_from_config, MemorySnapshotStore, SnapshotError, SnapshotStore,
    SqliteSnapshotStore,
};
