use crate::batch::{BatchError, BatchMutator, BatchOutcome, DispatchTarget};
use crate::feed::{ChangeRouter, FeedListener};
use crate::framework::FrameworkError;
use crate::guard::DuplicateGuard;
use crate::ingest::{IngestionSource, IngestionWorker};
use crate::ledger::{Ledger, LedgerError};
use crate::lifecycle::SessionConfig;
use crate::model::{OrderState, ProgressUpdate, RecordId};
use crate::report::ReportReader;
use crate::view::{Row, ViewClient, ViewHandle, ViewKind};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors surfaced by [`DispatchClient`] operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Reconciliation consumer unavailable: {0}")]
    Views(#[from] FrameworkError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Resources that live between `connect` and `disconnect`.
struct Session {
    generation: u64,
    ledger: Arc<dyn Ledger>,
    listener: (CancellationToken, JoinHandle<()>),
    ingestion: Option<(CancellationToken, JoinHandle<()>)>,
}

/// One running client instance.
///
/// `DispatchClient` is responsible for:
/// - **Task Management**: the reconciliation consumer for the client's lifetime, and
///   the feed listener and ingestion worker for each connected session.
/// - **Session Generations**: every connect opens a fresh generation so results
///   produced by an earlier session never reach the tables.
/// - **User Operations**: bulk actions, packing, progress edits and manual refreshes.
///
/// # Example
///
/// ```ignore
/// let mut client = DispatchClient::new(SessionConfig::new("bodega"))?;
/// client.connect(ledger.clone(), None).await?;
///
/// let outcome = client.dispatch(&[DispatchTarget::new(id, "Norte")]).await?;
/// let queue = client.rows(ViewKind::PackedPending).await?;
///
/// client.shutdown().await?;
/// ```
pub struct DispatchClient {
    config: SessionConfig,
    views: ViewClient,
    consumer: JoinHandle<()>,
    session: Option<Session>,
}

impl DispatchClient {
    /// Validates `config` and starts the reconciliation consumer.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let (views, consumer) = ViewClient::spawn(config.queue_capacity);
        Ok(Self {
            config,
            views,
            consumer,
            session: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Generation of the open session, if any.
    pub fn generation(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.generation)
    }

    /// Subscribes to `ledger`, enqueues its initial snapshot and starts the
    /// background tasks.
    ///
    /// The ingestion worker runs only when the configuration enables it and a
    /// source is given.
    #[tracing::instrument(skip_all, fields(user = %self.config.user))]
    pub async fn connect(
        &mut self,
        ledger: Arc<dyn Ledger>,
        ingestion: Option<Arc<dyn IngestionSource>>,
    ) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyConnected);
        }

        let generation = self.views.next_generation();
        self.views.open(generation).await?;

        let mut subscription = match ledger.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.views.close(generation).await?;
                return Err(e.into());
            }
        };

        // The initial snapshot is enqueued before any producer task starts.
        let mut router = ChangeRouter::new(ledger.clone(), self.views.handle(generation));
        let Some(snapshot) = subscription.next().await else {
            self.views.close(generation).await?;
            return Err(LedgerError::Network("change feed closed before snapshot".to_string()).into());
        };
        if let Err(e) = router.route(snapshot).await {
            warn!(error = %e, "Initial snapshot dropped");
        }

        let listener_token = CancellationToken::new();
        let listener = tokio::spawn(
            FeedListener::new(router, subscription, listener_token.clone()).run(),
        );

        let ingestion = match (self.config.ingest_enabled, ingestion) {
            (true, Some(source)) => {
                let token = CancellationToken::new();
                let worker = IngestionWorker::new(
                    source,
                    DuplicateGuard::new(ledger.clone()),
                    self.views.handle(generation),
                    self.config.poll_interval(),
                    token.clone(),
                );
                Some((token, tokio::spawn(worker.run())))
            }
            (true, None) => {
                warn!("Ingestion enabled but no source given");
                None
            }
            (false, _) => None,
        };

        info!(generation, ingest = ingestion.is_some(), "Connected");
        self.session = Some(Session {
            generation,
            ledger,
            listener: (listener_token, listener),
            ingestion,
        });
        Ok(())
    }

    /// Stops the session's tasks, in order, and releases the ledger.
    ///
    /// 1. Cancel and await the feed listener (its subscription is dropped).
    /// 2. Cancel and await the ingestion worker.
    /// 3. Close the generation: anything still in flight for it is discarded.
    /// 4. Drop the ledger handle.
    ///
    /// Rows stay in the projections until the next session's snapshot replaces them.
    #[tracing::instrument(skip_all, fields(user = %self.config.user))]
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let session = self.session.take().ok_or(SessionError::NotConnected)?;
        let mut failure = None;

        let (token, listener) = session.listener;
        token.cancel();
        if let Err(e) = listener.await {
            warn!(error = %e, "Feed listener ended abnormally");
            failure = Some(SessionError::TaskFailed(e.to_string()));
        }

        if let Some((token, worker)) = session.ingestion {
            token.cancel();
            if let Err(e) = worker.await {
                warn!(error = %e, "Ingestion worker ended abnormally");
                failure = failure.or(Some(SessionError::TaskFailed(e.to_string())));
            }
        }

        self.views.close(session.generation).await?;
        drop(session.ledger);

        info!(generation = session.generation, "Disconnected");
        failure.map_or(Ok(()), Err)
    }

    /// Disconnects if needed, then stops the reconciliation consumer.
    pub async fn shutdown(mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            self.disconnect().await?;
        }
        drop(self.views);
        self.consumer
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))
    }

    pub async fn dispatch(&self, targets: &[DispatchTarget]) -> Result<BatchOutcome, SessionError> {
        Ok(self.mutator()?.dispatch(targets).await?)
    }

    pub async fn delete(&self, ids: &[RecordId]) -> Result<BatchOutcome, SessionError> {
        Ok(self.mutator()?.delete(ids).await?)
    }

    pub async fn mark_pending(&self, ids: &[RecordId]) -> Result<BatchOutcome, SessionError> {
        Ok(self.mutator()?.mark_pending(ids).await?)
    }

    pub async fn release(&self, ids: &[RecordId]) -> Result<BatchOutcome, SessionError> {
        Ok(self.mutator()?.release(ids).await?)
    }

    pub async fn pack(&self, id: &RecordId, progress: &ProgressUpdate) -> Result<(), SessionError> {
        Ok(self.mutator()?.pack(id, progress).await?)
    }

    pub async fn update_progress(
        &self,
        id: &RecordId,
        progress: &ProgressUpdate,
    ) -> Result<(), SessionError> {
        Ok(self.mutator()?.update_progress(id, progress).await?)
    }

    /// Reloads the invoiced table from the ledger. Returns the row count.
    pub async fn refresh_invoiced(&self) -> Result<usize, SessionError> {
        self.refresh(ViewKind::Invoiced).await
    }

    /// Reloads the packed/pending table from the ledger. Returns the row count.
    pub async fn refresh_packed(&self) -> Result<usize, SessionError> {
        self.refresh(ViewKind::PackedPending).await
    }

    /// Copies one table's rows. Works while disconnected too.
    pub async fn rows(&self, view: ViewKind) -> Result<Vec<Row>, SessionError> {
        Ok(self.views.rows(view).await?)
    }

    /// Read-only access for the report generator.
    pub fn reports(&self) -> Result<ReportReader, SessionError> {
        Ok(ReportReader::new(self.session()?.ledger.clone()))
    }

    async fn refresh(&self, view: ViewKind) -> Result<usize, SessionError> {
        let session = self.session()?;
        let states: &[OrderState] = view.states();
        let records = ReportReader::new(session.ledger.clone())
            .read_by_states(states)
            .await?;
        let count = records.len();
        self.producer(session).bulk_load(view, records).await?;
        info!(%view, count, "Refreshed");
        Ok(count)
    }

    fn session(&self) -> Result<&Session, SessionError> {
        self.session.as_ref().ok_or(SessionError::NotConnected)
    }

    fn producer(&self, session: &Session) -> ViewHandle {
        self.views.handle(session.generation)
    }

    fn mutator(&self) -> Result<BatchMutator, SessionError> {
        let ledger = self.session()?.ledger.clone();
        Ok(BatchMutator::new(ledger).with_zones(self.config.zones.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::{MemoryLedger, Notification, Subscription};
    use serde_json::Value;

    #[tokio::test]
    async fn test_operations_require_connection() {
        let client = DispatchClient::new(SessionConfig::new("caja")).unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.delete(&[]).await, Err(SessionError::NotConnected));
        assert_eq!(client.refresh_packed().await, Err(SessionError::NotConnected));
        assert!(client.rows(ViewKind::Invoiced).await.unwrap().is_empty());
        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::spawn(16));
        let mut client = DispatchClient::new(SessionConfig::new("caja")).unwrap();

        client.connect(ledger.clone(), None).await.unwrap();
        assert_eq!(client.generation(), Some(1));
        assert_eq!(client.connect(ledger.clone(), None).await, Err(SessionError::AlreadyConnected));

        client.disconnect().await.unwrap();
        assert_eq!(client.disconnect().await, Err(SessionError::NotConnected));

        client.connect(ledger, None).await.unwrap();
        assert_eq!(client.generation(), Some(2));
        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_subscribe_leaves_client_disconnected() {
        let mock = MockLedger::new();
        mock.expect_subscribe()
            .return_err(LedgerError::Network("denied".to_string()));
        let mut client = DispatchClient::new(SessionConfig::new("caja")).unwrap();

        let result = client.connect(Arc::new(mock.clone()), None).await;
        assert_eq!(
            result,
            Err(SessionError::Ledger(LedgerError::Network("denied".to_string())))
        );
        assert!(!client.is_connected());

        let (feed, subscription) = Subscription::channel();
        feed.send(Notification::put("/", Value::Null)).unwrap();
        mock.expect_subscribe().return_ok(subscription);
        client.connect(Arc::new(mock.clone()), None).await.unwrap();
        client.shutdown().await.unwrap();
        mock.verify();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SessionConfig::new("caja").with_queue_capacity(0);
        assert!(matches!(DispatchClient::new(config), Err(SessionError::Config(_))));
    }
}
