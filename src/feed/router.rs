//! # Change Router
//!
//! Turns classified notifications into projection commands. The router never
//! trusts a notification payload for single records: it re-reads the full record
//! from the ledger and decides from the record's current state.
//!
//! | event | current state | commands |
//! |---|---|---|
//! | `Snapshot` (first per session) | any | bulk load of both views |
//! | `ForeignBulkChange` | Deleted, Dispatched | remove from every view |
//! | `ForeignBulkChange` | Pending | update in the packed/pending view |
//! | `ForeignBulkChange` | Packed | update in the packed/pending view, remove from invoiced |
//! | `RecordCreated` | Packed | insert into the packed/pending view |
//! | `RecordPatched` | Packed | update in the packed/pending view, remove from invoiced |
//!
//! Anything else is ignored.

use crate::feed::{classify, ChangeEvent, FeedError};
use crate::ledger::{decode_documents, Documents, Ledger, Notification};
use crate::model::{OrderRecord, OrderState, RecordId};
use crate::view::{ViewHandle, ViewKind};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct ChangeRouter {
    ledger: Arc<dyn Ledger>,
    views: ViewHandle,
    snapshot_applied: bool,
}

impl ChangeRouter {
    pub fn new(ledger: Arc<dyn Ledger>, views: ViewHandle) -> Self {
        Self {
            ledger,
            views,
            snapshot_applied: false,
        }
    }

    /// Handles one notification and returns how many commands were enqueued.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Malformed`] if the notification cannot be classified.
    /// - [`FeedError::StaleReference`] / [`FeedError::Ledger`] if a single-record
    ///   re-read fails. Bulk changes log per-record failures and continue.
    /// - [`FeedError::QueueClosed`] if the consumer is gone.
    pub async fn route(&mut self, notification: Notification) -> Result<usize, FeedError> {
        match classify(&notification)? {
            ChangeEvent::Snapshot(documents) => self.on_snapshot(documents).await,
            ChangeEvent::ForeignBulkChange(ids) => self.on_bulk_change(ids).await,
            ChangeEvent::RecordCreated(id) => self.on_created(id).await,
            ChangeEvent::RecordPatched(id) => self.on_patched(id).await,
        }
    }

    async fn on_snapshot(&mut self, documents: Documents) -> Result<usize, FeedError> {
        if self.snapshot_applied {
            debug!(size = documents.len(), "Ignoring repeated snapshot");
            return Ok(0);
        }

        let mut invoiced = Vec::new();
        let mut packed_pending = Vec::new();
        for (id, record) in decode_documents(documents) {
            if ViewKind::Invoiced.accepts(record.state) {
                invoiced.push((id, record));
            } else if ViewKind::PackedPending.accepts(record.state) {
                packed_pending.push((id, record));
            }
        }
        info!(
            invoiced = invoiced.len(),
            packed_pending = packed_pending.len(),
            "Applying snapshot"
        );

        self.views.bulk_load(ViewKind::Invoiced, invoiced).await?;
        self.views.bulk_load(ViewKind::PackedPending, packed_pending).await?;
        self.snapshot_applied = true;
        Ok(2)
    }

    async fn on_bulk_change(&self, ids: Vec<RecordId>) -> Result<usize, FeedError> {
        let mut enqueued = 0;
        for id in ids {
            let record = match self.reread(&id).await {
                Ok(record) => record,
                Err(e @ FeedError::Ledger(_)) => {
                    error!(%id, error = %e, "Re-read failed, skipping record");
                    continue;
                }
                Err(e) => {
                    warn!(%id, error = %e, "Skipping record");
                    continue;
                }
            };

            match record.state {
                OrderState::Deleted | OrderState::Dispatched => {
                    debug!(%id, state = %record.state, "Removing from views");
                    self.views.remove_everywhere(&id).await?;
                    enqueued += ViewKind::ALL.len();
                }
                OrderState::Pending => {
                    self.views.update(ViewKind::PackedPending, id, record).await?;
                    enqueued += 1;
                }
                OrderState::Packed => {
                    self.views.remove(ViewKind::Invoiced, id.clone()).await?;
                    self.views.update(ViewKind::PackedPending, id, record).await?;
                    enqueued += 2;
                }
                OrderState::Invoiced => {
                    debug!(%id, "Bulk change on invoiced record ignored");
                }
            }
        }
        Ok(enqueued)
    }

    async fn on_created(&self, id: RecordId) -> Result<usize, FeedError> {
        let record = self.reread(&id).await?;
        if record.state != OrderState::Packed {
            debug!(%id, state = %record.state, "Created record not packed, ignored");
            return Ok(0);
        }
        self.views.insert(ViewKind::PackedPending, id, record).await?;
        Ok(1)
    }

    async fn on_patched(&self, id: RecordId) -> Result<usize, FeedError> {
        let record = self.reread(&id).await?;
        if record.state != OrderState::Packed {
            debug!(%id, state = %record.state, "Patched record not packed, ignored");
            return Ok(0);
        }
        self.views.remove(ViewKind::Invoiced, id.clone()).await?;
        self.views.update(ViewKind::PackedPending, id, record).await?;
        Ok(2)
    }

    async fn reread(&self, id: &RecordId) -> Result<OrderRecord, FeedError> {
        let document = self
            .ledger
            .read_child(id)
            .await?
            .ok_or_else(|| FeedError::StaleReference(id.clone()))?;
        OrderRecord::from_value(document).map_err(|e| {
            debug!(%id, error = %e, "Re-read returned an invalid record");
            FeedError::StaleReference(id.clone())
        })
    }
}
