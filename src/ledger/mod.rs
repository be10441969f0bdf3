//! # Order Ledger
//!
//! The shared, event-streaming document store every client reads from and writes to.
//! The ledger is the sole source of truth; local projections are caches of it.
//!
//! Documents live under a flat collection keyed by [`RecordId`]. Paths follow the
//! collection layout:
//!
//! | path | meaning |
//! |---|---|
//! | `/` | the whole collection |
//! | `/<id>` | one record |
//! | `/<id>/<field>` | one field of one record |
//!
//! ## Key Types
//!
//! - [`Ledger`]: the async client seam (insert, queries, reads, atomic multi-path patch,
//!   change-feed subscription).
//! - [`Notification`]: one change-feed event (`path`, [`ChangeKind`], payload).
//! - [`LedgerPatch`]: an atomic multi-path update (`"<id>/<field>" -> value`).
//! - [`Subscription`]: the receiving end of a change feed. Dropping it unsubscribes.
//!
//! ## Implementations
//!
//! - [`memory::MemoryLedger`]: an in-process ledger actor used by the binary and the
//!   integration tests.
//! - [`mock::MockLedger`]: an expectation-driven ledger for unit tests.

pub mod error;
pub mod memory;
pub mod mock;

pub use error::LedgerError;
pub use memory::{LedgerActor, MemoryLedger};

use crate::model::{OrderRecord, RecordId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use tracing::warn;

/// Raw documents keyed by record id, as returned by queries.
pub type Documents = BTreeMap<RecordId, Value>;

/// Decodes raw documents, logging and skipping entries that are not valid records.
pub fn decode_documents(documents: Documents) -> Vec<(RecordId, OrderRecord)> {
    documents
        .into_iter()
        .filter_map(|(id, doc)| match OrderRecord::from_value(doc) {
            Ok(record) => Some((id, record)),
            Err(e) => {
                warn!(%id, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

/// Whether a notification replaces (`Put`) or merges into (`Patch`) its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Put,
    Patch,
}

/// One change-feed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub path: String,
    pub kind: ChangeKind,
    pub payload: Value,
}

impl Notification {
    pub fn put(path: impl Into<String>, payload: Value) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Put,
            payload,
        }
    }

    pub fn patch(path: impl Into<String>, payload: Value) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Patch,
            payload,
        }
    }
}

/// Atomic multi-path update. Keys are `"<id>"` or `"<id>/<field>"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerPatch(BTreeMap<String, Value>);

impl LedgerPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field of one record.
    pub fn set(&mut self, id: &RecordId, field: &str, value: impl Into<Value>) {
        self.0.insert(format!("{id}/{field}"), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    /// Distinct record ids touched by the patch.
    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.0
            .keys()
            .map(|path| RecordId::from(path.split('/').next().unwrap_or(path.as_str())))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The patch as the payload of a root `Patch` notification.
    pub fn to_payload(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>())
    }
}

/// Receiving end of a change feed.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Notification>,
}

impl Subscription {
    /// Creates a connected feed; the ledger keeps the sender.
    pub fn channel() -> (mpsc::UnboundedSender<Notification>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Next notification, or `None` once the ledger side is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }
}

/// Client seam to the order ledger.
///
/// Every method is a single remote call. Failures are reported, never retried here.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Pushes a new record and returns its ledger-assigned id.
    async fn insert(&self, record: OrderRecord) -> Result<RecordId, LedgerError>;

    /// Returns every document whose top-level `field` equals `value`.
    async fn query_by_field(&self, field: &str, value: Value) -> Result<Documents, LedgerError>;

    /// Returns the document stored under `id`, as a one-entry map (empty if absent).
    async fn query_by_key(&self, id: &RecordId) -> Result<Documents, LedgerError>;

    /// Reads the raw document under `id`; `None` if there is none.
    async fn read_child(&self, id: &RecordId) -> Result<Option<Value>, LedgerError>;

    /// Applies every entry of `patch` atomically.
    async fn patch_multiple(&self, patch: LedgerPatch) -> Result<(), LedgerError>;

    /// Opens a change feed. The first notification is a root `Put` with the whole
    /// collection (or `null` when empty).
    async fn subscribe(&self) -> Result<Subscription, LedgerError>;
}
