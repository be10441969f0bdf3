//! Periodic ingestion task.

use crate::guard::{DuplicateGuard, GuardError, InsertedOrder};
use crate::ingest::{normalize, IngestError, IngestionSource, SourceId};
use crate::model::{OrderRecord, OrderState};
use crate::view::{ViewHandle, ViewKind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-tick tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    /// Failed validation; left in the source for someone to fix.
    pub rejected: usize,
    /// Left in the source after a ledger failure, for the next tick.
    pub retained: usize,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        *self == IngestReport::default()
    }
}

pub struct IngestionWorker {
    source: Arc<dyn IngestionSource>,
    guard: DuplicateGuard,
    views: ViewHandle,
    interval: Duration,
    shutdown: CancellationToken,
}

impl IngestionWorker {
    pub fn new(
        source: Arc<dyn IngestionSource>,
        guard: DuplicateGuard,
        views: ViewHandle,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            guard,
            views,
            interval,
            shutdown,
        }
    }

    /// Polls every `interval` until cancelled. The first poll happens immediately.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Ingestion worker started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Ingestion worker shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) if report.is_empty() => debug!("Nothing to ingest"),
                        Ok(report) => info!(
                            inserted = report.inserted,
                            duplicates = report.duplicates,
                            rejected = report.rejected,
                            retained = report.retained,
                            "Ingestion tick"
                        ),
                        Err(IngestError::QueueClosed(e)) => {
                            warn!(error = %e, "View queue closed, stopping");
                            break;
                        }
                        Err(e) => error!(error = %e, "Ingestion tick failed"),
                    }
                }
            }
        }

        info!("Ingestion worker stopped");
    }

    /// Runs one ingestion pass over every waiting document.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Source`] if the source cannot be listed.
    /// - [`IngestError::QueueClosed`] if the reconciliation consumer is gone.
    pub async fn poll_once(&self) -> Result<IngestReport, IngestError> {
        let documents = self.source.poll_new_documents().await?;
        let mut report = IngestReport::default();

        for (source_id, fields) in documents {
            let order = match normalize(&fields) {
                Ok(order) => order,
                Err(e) => {
                    warn!(source = %source_id, error = %e, "Rejected document, keeping it for review");
                    report.rejected += 1;
                    continue;
                }
            };

            match self.guard.try_insert(order).await {
                Ok(inserted) => {
                    self.enqueue_inserted(inserted).await?;
                    report.inserted += 1;
                    self.discard(&source_id).await;
                }
                Err(GuardError::DuplicateInvoice { invoice_number, existing }) => {
                    info!(source = %source_id, invoice_number, %existing, "Duplicate document");
                    report.duplicates += 1;
                    self.discard(&source_id).await;
                }
                Err(GuardError::Network(e)) => {
                    error!(source = %source_id, error = %e, "Ledger unavailable, keeping document");
                    report.retained += 1;
                }
            }
        }

        Ok(report)
    }

    /// Enqueues the record as currently stored. A record that already left
    /// `Invoiced` (or is gone) is not enqueued; the change feed owns it.
    async fn enqueue_inserted(&self, inserted: InsertedOrder) -> Result<(), IngestError> {
        let InsertedOrder { id, record } = inserted;
        let record = match self.guard.ledger().read_child(&id).await {
            Ok(Some(document)) => match OrderRecord::from_value(document) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(%id, error = %e, "Inserted record unreadable, not enqueued");
                    return Ok(());
                }
            },
            Ok(None) => {
                debug!(%id, "Inserted record already removed");
                return Ok(());
            }
            Err(e) => {
                warn!(%id, error = %e, "Re-read failed, enqueueing inserted copy");
                record
            }
        };

        if record.state != OrderState::Invoiced {
            debug!(%id, state = %record.state, "Inserted record already moved on");
            return Ok(());
        }
        self.views.insert(ViewKind::Invoiced, id, record).await?;
        Ok(())
    }

    async fn discard(&self, source_id: &SourceId) {
        if let Err(e) = self.source.discard(source_id).await {
            warn!(source = %source_id, error = %e, "Discard failed");
        }
    }
}
