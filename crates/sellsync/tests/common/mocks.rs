//! Scripted stand-ins for the remote draft API and the AI endpoint.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sellsync::drafts::{DraftAck, DraftApiError, DraftStore, DraftUpdate, NewDraft, RemoteDraft};
use sellsync::extract::CompletionTransport;
use sellsync::ExtractError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { key: String, content: Value },
    Update { id: String, content: Value },
    Delete { id: String },
    List { key: String },
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::List { .. })
    }
}

pub fn transient() -> DraftApiError {
    DraftApiError::Status {
        status: 503,
        message: "unavailable".into(),
    }
}

pub fn permanent(status: u16) -> DraftApiError {
    DraftApiError::Status {
        status,
        message: "rejected".into(),
    }
}

/// Records every call. Each operation pops a scripted result first and
/// succeeds once its script is empty; creates hand out `srv-1`, `srv-2`, ...
#[derive(Default)]
pub struct MockDraftStore {
    calls: Mutex<Vec<Call>>,
    creates: Mutex<VecDeque<Result<DraftAck, DraftApiError>>>,
    updates: Mutex<VecDeque<Result<DraftAck, DraftApiError>>>,
    deletes: Mutex<VecDeque<Result<(), DraftApiError>>>,
    listing: Mutex<Vec<RemoteDraft>>,
    listing_error: Mutex<Option<DraftApiError>>,
    latency: Mutex<Duration>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_create(&self, result: Result<DraftAck, DraftApiError>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn script_update(&self, result: Result<DraftAck, DraftApiError>) {
        self.updates.lock().unwrap().push_back(result);
    }

    pub fn script_delete(&self, result: Result<(), DraftApiError>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn set_listing(&self, listing: Result<Vec<RemoteDraft>, DraftApiError>) {
        match listing {
            Ok(drafts) => {
                *self.listing.lock().unwrap() = drafts;
                *self.listing_error.lock().unwrap() = None;
            }
            Err(e) => *self.listing_error.lock().unwrap() = Some(e),
        }
    }

    /// Every write sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin_write(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn end_write(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn fresh_ack(&self) -> DraftAck {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        DraftAck {
            id: format!("srv-{}", n),
            updated_at: 1,
        }
    }
}

#[async_trait]
impl DraftStore for MockDraftStore {
    async fn create_draft(&self, draft: &NewDraft) -> Result<DraftAck, DraftApiError> {
        self.begin_write(Call::Create {
            key: draft.key.clone(),
            content: draft.content.clone(),
        })
        .await;
        let scripted = self.creates.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(self.fresh_ack()));
        self.end_write();
        result
    }

    async fn update_draft(&self, id: &str, update: &DraftUpdate) -> Result<DraftAck, DraftApiError> {
        self.begin_write(Call::Update {
            id: id.to_string(),
            content: update.content.clone(),
        })
        .await;
        let scripted = self.updates.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| {
            Ok(DraftAck {
                id: id.to_string(),
                updated_at: 1,
            })
        });
        self.end_write();
        result
    }

    async fn delete_draft(&self, id: &str) -> Result<(), DraftApiError> {
        self.begin_write(Call::Delete { id: id.to_string() }).await;
        let result = self.deletes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        self.end_write();
        result
    }

    async fn get_drafts(&self, key: &str) -> Result<Vec<RemoteDraft>, DraftApiError> {
        self.calls.lock().unwrap().push(Call::List {
            key: key.to_string(),
        });
        if let Some(e) = self.listing_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.listing.lock().unwrap().clone())
    }
}

/// AI endpoint replaying a fixed reply.
pub struct MockTransport {
    reply: Result<String, u16>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionTransport for MockTransport {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(ExtractError::Status {
                status: *status,
                body: "mock failure".into(),
            }),
        }
    }
}
