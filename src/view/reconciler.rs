//! # Reconciliation Consumer
//!
//! One task per client owns both projections and applies [`ViewCommand`]s one at a
//! time from a bounded queue. Producers (the feed listener, the ingestion worker,
//! manual refreshes) only enqueue; none of them touch a projection directly, so the
//! projections need no locks.
//!
//! ## Session generations
//!
//! Every command is tagged with the generation of the session that produced it.
//! Opening a session makes its generation the active one; closing it deactivates it.
//! Commands carrying any other generation are discarded, so results that arrive
//! after a disconnect never reach the tables.

use crate::framework::{request, short_type_name, FrameworkError, Response};
use crate::model::{OrderRecord, RecordId};
use crate::view::{Projection, Row, ViewKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A change to one projection.
#[derive(Debug, Clone)]
pub enum ViewCommand {
    BulkLoad {
        view: ViewKind,
        records: Vec<(RecordId, OrderRecord)>,
    },
    Insert {
        view: ViewKind,
        id: RecordId,
        record: OrderRecord,
    },
    Update {
        view: ViewKind,
        id: RecordId,
        record: OrderRecord,
    },
    Remove {
        view: ViewKind,
        id: RecordId,
    },
}

/// Messages handled by [`ReconcilerActor`].
#[derive(Debug)]
pub enum ViewRequest {
    Apply {
        generation: u64,
        command: ViewCommand,
    },
    Open {
        generation: u64,
        respond_to: Response<()>,
    },
    Close {
        generation: u64,
        respond_to: Response<()>,
    },
    Rows {
        view: ViewKind,
        respond_to: Response<Vec<Row>>,
    },
}

pub struct ReconcilerActor {
    receiver: mpsc::Receiver<ViewRequest>,
    invoiced: Projection,
    packed_pending: Projection,
    active: Option<u64>,
}

impl ReconcilerActor {
    /// Creates the consumer and its client. `capacity` bounds the command queue.
    pub fn new(capacity: usize) -> (Self, ViewClient) {
        let (sender, receiver) = mpsc::channel(capacity);
        let actor = Self {
            receiver,
            invoiced: Projection::new(ViewKind::Invoiced),
            packed_pending: Projection::new(ViewKind::PackedPending),
            active: None,
        };
        let client = ViewClient {
            sender,
            generations: Arc::new(AtomicU64::new(0)),
        };
        (actor, client)
    }

    /// Runs until every [`ViewClient`] and [`ViewHandle`] is dropped.
    pub async fn run(mut self) {
        let actor = short_type_name::<Self>();
        info!(actor, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ViewRequest::Apply { generation, command } => {
                    if self.active != Some(generation) {
                        debug!(actor, generation, active = ?self.active, "Discarding stale command");
                        continue;
                    }
                    self.apply(command);
                }
                ViewRequest::Open { generation, respond_to } => {
                    self.active = Some(generation);
                    info!(actor, generation, "Session opened");
                    let _ = respond_to.send(());
                }
                ViewRequest::Close { generation, respond_to } => {
                    if self.active == Some(generation) {
                        self.active = None;
                        info!(actor, generation, "Session closed");
                    }
                    let _ = respond_to.send(());
                }
                ViewRequest::Rows { view, respond_to } => {
                    let _ = respond_to.send(self.projection(view).rows());
                }
            }
        }

        info!(
            actor,
            invoiced = self.invoiced.len(),
            packed_pending = self.packed_pending.len(),
            "Shutdown"
        );
    }

    fn projection(&mut self, view: ViewKind) -> &mut Projection {
        match view {
            ViewKind::Invoiced => &mut self.invoiced,
            ViewKind::PackedPending => &mut self.packed_pending,
        }
    }

    fn apply(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::BulkLoad { view, records } => {
                let projection = self.projection(view);
                projection.apply_bulk_load(records);
                info!(%view, size = projection.len(), "Bulk load");
            }
            ViewCommand::Insert { view, id, record } => {
                let is_new = self.projection(view).apply_insert(id.clone(), record);
                debug!(%view, %id, is_new, "Insert");
            }
            ViewCommand::Update { view, id, record } => {
                let existed = self.projection(view).apply_update(id.clone(), record);
                debug!(%view, %id, existed, "Update");
            }
            ViewCommand::Remove { view, id } => {
                let removed = self.projection(view).apply_removal(&id);
                debug!(%view, %id, removed, "Remove");
            }
        }
    }
}

/// Client for the reconciliation consumer, held by the session.
#[derive(Debug, Clone)]
pub struct ViewClient {
    sender: mpsc::Sender<ViewRequest>,
    generations: Arc<AtomicU64>,
}

impl ViewClient {
    /// Spawns a consumer on the current runtime.
    pub fn spawn(capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (actor, client) = ReconcilerActor::new(capacity);
        let handle = tokio::spawn(actor.run());
        (client, handle)
    }

    /// Allocates a fresh session generation.
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn open(&self, generation: u64) -> Result<(), FrameworkError> {
        request(&self.sender, |respond_to| ViewRequest::Open { generation, respond_to }).await
    }

    /// Deactivates `generation`. Returns once every command queued before it is applied.
    pub async fn close(&self, generation: u64) -> Result<(), FrameworkError> {
        request(&self.sender, |respond_to| ViewRequest::Close { generation, respond_to }).await
    }

    /// Copies the rows of one projection.
    pub async fn rows(&self, view: ViewKind) -> Result<Vec<Row>, FrameworkError> {
        request(&self.sender, |respond_to| ViewRequest::Rows { view, respond_to }).await
    }

    /// A producer handle whose commands carry `generation`.
    pub fn handle(&self, generation: u64) -> ViewHandle {
        ViewHandle {
            sender: self.sender.clone(),
            generation,
        }
    }
}

/// Enqueue-only handle given to producers.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    sender: mpsc::Sender<ViewRequest>,
    generation: u64,
}

impl ViewHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn send(&self, command: ViewCommand) -> Result<(), FrameworkError> {
        self.sender
            .send(ViewRequest::Apply {
                generation: self.generation,
                command,
            })
            .await
            .map_err(|_| FrameworkError::ActorClosed)
    }

    pub async fn bulk_load(
        &self,
        view: ViewKind,
        records: Vec<(RecordId, OrderRecord)>,
    ) -> Result<(), FrameworkError> {
        self.send(ViewCommand::BulkLoad { view, records }).await
    }

    pub async fn insert(
        &self,
        view: ViewKind,
        id: RecordId,
        record: OrderRecord,
    ) -> Result<(), FrameworkError> {
        self.send(ViewCommand::Insert { view, id, record }).await
    }

    pub async fn update(
        &self,
        view: ViewKind,
        id: RecordId,
        record: OrderRecord,
    ) -> Result<(), FrameworkError> {
        self.send(ViewCommand::Update { view, id, record }).await
    }

    pub async fn remove(&self, view: ViewKind, id: RecordId) -> Result<(), FrameworkError> {
        self.send(ViewCommand::Remove { view, id }).await
    }

    /// Removes `id` from every projection.
    pub async fn remove_everywhere(&self, id: &RecordId) -> Result<(), FrameworkError> {
        for view in ViewKind::ALL {
            self.remove(view, id.clone()).await?;
        }
        Ok(())
    }
}
