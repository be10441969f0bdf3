//! # In-Process Ledger
//!
//! A single actor that owns the collection and fans out change notifications to
//! every open subscription, in commit order. Clients talk to it through the
//! cloneable [`MemoryLedger`] handle, which implements [`Ledger`].
//!
//! Notifications mirror what a remote event-streaming store emits:
//!
//! | write | notification |
//! |---|---|
//! | [`Ledger::insert`], [`MemoryLedger::put`] | `Put` at `/<id>` |
//! | [`Ledger::patch_multiple`] | one `Patch` at `/` with every patched key |
//! | [`MemoryLedger::update_field`] | `Patch` at `/<id>/<field>` |
//! | [`Ledger::subscribe`] | `Put` at `/` with the whole collection, to the new subscriber only |

use crate::framework::{request, short_type_name, Response};
use crate::ledger::{Documents, Ledger, LedgerError, LedgerPatch, Notification, Subscription};
use crate::model::{OrderRecord, RecordId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Messages handled by [`LedgerActor`].
#[derive(Debug)]
pub enum LedgerRequest {
    Insert {
        document: Value,
        respond_to: Response<RecordId>,
    },
    QueryByField {
        field: String,
        value: Value,
        respond_to: Response<Documents>,
    },
    ReadChild {
        id: RecordId,
        respond_to: Response<Option<Value>>,
    },
    PatchMultiple {
        patch: LedgerPatch,
        respond_to: Response<Result<(), LedgerError>>,
    },
    Put {
        id: RecordId,
        document: Value,
        respond_to: Response<()>,
    },
    UpdateField {
        id: RecordId,
        field: String,
        value: Value,
        respond_to: Response<Result<(), LedgerError>>,
    },
    Subscribe {
        sender: mpsc::UnboundedSender<Notification>,
        respond_to: Response<()>,
    },
}

/// The server half: owns the collection and the subscriber list.
pub struct LedgerActor {
    receiver: mpsc::Receiver<LedgerRequest>,
    documents: Documents,
    subscribers: Vec<mpsc::UnboundedSender<Notification>>,
}

impl LedgerActor {
    /// Creates the actor and its client. The actor must be driven with [`LedgerActor::run`].
    pub fn new(buffer_size: usize) -> (Self, MemoryLedger) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            documents: Documents::new(),
            subscribers: Vec::new(),
        };
        (actor, MemoryLedger { sender })
    }

    /// Processes requests until every [`MemoryLedger`] handle is dropped.
    pub async fn run(mut self) {
        let actor = short_type_name::<Self>();
        info!(actor, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                LedgerRequest::Insert { document, respond_to } => {
                    let id = RecordId::from(Uuid::now_v7().simple().to_string());
                    self.documents.insert(id.clone(), document.clone());
                    info!(actor, %id, size = self.documents.len(), "Inserted");
                    self.broadcast(Notification::put(format!("/{id}"), document));
                    let _ = respond_to.send(id);
                }
                LedgerRequest::QueryByField { field, value, respond_to } => {
                    let matches: Documents = self
                        .documents
                        .iter()
                        .filter(|(_, doc)| doc.get(&field) == Some(&value))
                        .map(|(id, doc)| (id.clone(), doc.clone()))
                        .collect();
                    debug!(actor, field = %field, %value, found = matches.len(), "Query");
                    let _ = respond_to.send(matches);
                }
                LedgerRequest::ReadChild { id, respond_to } => {
                    let doc = self.documents.get(&id).cloned();
                    debug!(actor, %id, found = doc.is_some(), "Read");
                    let _ = respond_to.send(doc);
                }
                LedgerRequest::PatchMultiple { patch, respond_to } => {
                    let result = self.apply_patch(&patch);
                    match &result {
                        Ok(()) => {
                            info!(actor, keys = patch.len(), "Patched");
                            self.broadcast(Notification::patch("/", patch.to_payload()));
                        }
                        Err(e) => warn!(actor, error = %e, "Patch rejected"),
                    }
                    let _ = respond_to.send(result);
                }
                LedgerRequest::Put { id, document, respond_to } => {
                    if document.is_null() {
                        self.documents.remove(&id);
                    } else {
                        self.documents.insert(id.clone(), document.clone());
                    }
                    debug!(actor, %id, "Put");
                    self.broadcast(Notification::put(format!("/{id}"), document));
                    let _ = respond_to.send(());
                }
                LedgerRequest::UpdateField { id, field, value, respond_to } => {
                    let mut patch = LedgerPatch::new();
                    patch.set(&id, &field, value.clone());
                    let result = self.apply_patch(&patch);
                    if result.is_ok() {
                        debug!(actor, %id, field = %field, "Field updated");
                        self.broadcast(Notification::patch(format!("/{id}/{field}"), value));
                    }
                    let _ = respond_to.send(result);
                }
                LedgerRequest::Subscribe { sender, respond_to } => {
                    let snapshot = self.snapshot();
                    if sender.send(Notification::put("/", snapshot)).is_ok() {
                        self.subscribers.push(sender);
                    }
                    info!(actor, subscribers = self.subscribers.len(), "Subscribed");
                    let _ = respond_to.send(());
                }
            }
        }

        info!(actor, size = self.documents.len(), "Shutdown");
    }

    fn snapshot(&self) -> Value {
        if self.documents.is_empty() {
            return Value::Null;
        }
        Value::Object(
            self.documents
                .iter()
                .map(|(id, doc)| (id.to_string(), doc.clone()))
                .collect::<Map<_, _>>(),
        )
    }

    /// Validates every key first, then applies them all.
    fn apply_patch(&mut self, patch: &LedgerPatch) -> Result<(), LedgerError> {
        let mut writes = Vec::with_capacity(patch.len());
        for (path, value) in patch.iter() {
            let mut segments = path.split('/');
            let id = segments.next().filter(|s| !s.is_empty());
            let field = segments.next();
            if id.is_none() || field == Some("") || segments.next().is_some() {
                return Err(LedgerError::InvalidPath(path.clone()));
            }
            if let Some(id) = id {
                writes.push((RecordId::from(id), field, value));
            }
        }

        for (id, field, value) in writes {
            match field {
                None if value.is_null() => {
                    self.documents.remove(&id);
                }
                None => {
                    self.documents.insert(id, value.clone());
                }
                Some(field) => {
                    let doc = self
                        .documents
                        .entry(id)
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !doc.is_object() {
                        *doc = Value::Object(Map::new());
                    }
                    if let Value::Object(fields) = doc {
                        if value.is_null() {
                            fields.remove(field);
                        } else {
                            fields.insert(field.to_string(), value.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn broadcast(&mut self, notification: Notification) {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            debug!(dropped, "Pruned closed subscriptions");
        }
    }
}

/// Cloneable handle to a running [`LedgerActor`].
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    sender: mpsc::Sender<LedgerRequest>,
}

impl MemoryLedger {
    /// Spawns a ledger actor on the current runtime and returns its handle.
    pub fn spawn(buffer_size: usize) -> Self {
        let (actor, ledger) = LedgerActor::new(buffer_size);
        tokio::spawn(actor.run());
        ledger
    }

    /// Replaces (or with `null`, removes) a whole record.
    pub async fn put(&self, id: &RecordId, document: Value) -> Result<(), LedgerError> {
        let id = id.clone();
        request(&self.sender, |respond_to| LedgerRequest::Put { id, document, respond_to }).await?;
        Ok(())
    }

    /// Sets a single field of one record.
    pub async fn update_field(
        &self,
        id: &RecordId,
        field: &str,
        value: Value,
    ) -> Result<(), LedgerError> {
        let id = id.clone();
        let field = field.to_string();
        request(&self.sender, |respond_to| LedgerRequest::UpdateField {
            id,
            field,
            value,
            respond_to,
        })
        .await?
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn insert(&self, record: OrderRecord) -> Result<RecordId, LedgerError> {
        let document = record
            .to_value()
            .map_err(|e| LedgerError::Encoding(e.to_string()))?;
        Ok(request(&self.sender, |respond_to| LedgerRequest::Insert { document, respond_to }).await?)
    }

    async fn query_by_field(&self, field: &str, value: Value) -> Result<Documents, LedgerError> {
        let field = field.to_string();
        Ok(request(&self.sender, |respond_to| LedgerRequest::QueryByField {
            field,
            value,
            respond_to,
        })
        .await?)
    }

    async fn query_by_key(&self, id: &RecordId) -> Result<Documents, LedgerError> {
        let doc = self.read_child(id).await?;
        Ok(doc.map(|doc| (id.clone(), doc)).into_iter().collect())
    }

    async fn read_child(&self, id: &RecordId) -> Result<Option<Value>, LedgerError> {
        let id = id.clone();
        Ok(request(&self.sender, |respond_to| LedgerRequest::ReadChild { id, respond_to }).await?)
    }

    async fn patch_multiple(&self, patch: LedgerPatch) -> Result<(), LedgerError> {
        request(&self.sender, |respond_to| LedgerRequest::PatchMultiple { patch, respond_to }).await?
    }

    async fn subscribe(&self) -> Result<Subscription, LedgerError> {
        let (sender, subscription) = Subscription::channel();
        request(&self.sender, |respond_to| LedgerRequest::Subscribe { sender, respond_to }).await?;
        Ok(subscription)
    }
}
