//! Background task that drains a change feed into the router.

use crate::feed::{ChangeRouter, FeedError};
use crate::ledger::Subscription;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct FeedListener {
    router: ChangeRouter,
    subscription: Subscription,
    shutdown: CancellationToken,
}

impl FeedListener {
    pub fn new(router: ChangeRouter, subscription: Subscription, shutdown: CancellationToken) -> Self {
        Self {
            router,
            subscription,
            shutdown,
        }
    }

    /// Routes notifications until cancelled, the feed ends, or the consumer is gone.
    ///
    /// A notification that fails to route is logged and dropped; delivery continues.
    /// Returning drops the subscription, which unsubscribes from the ledger.
    pub async fn run(mut self) {
        info!("Feed listener started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Feed listener shutting down");
                    break;
                }

                next = self.subscription.next() => {
                    let Some(notification) = next else {
                        warn!("Change feed closed by ledger");
                        break;
                    };
                    let path = notification.path.clone();
                    match self.router.route(notification).await {
                        Ok(enqueued) => debug!(path = %path, enqueued, "Routed"),
                        Err(FeedError::QueueClosed(e)) => {
                            warn!(error = %e, "View queue closed, stopping");
                            break;
                        }
                        Err(e) => warn!(path = %path, error = %e, "Dropped notification"),
                    }
                }
            }
        }

        info!("Feed listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::Notification;
    use crate::view::{ViewClient, ViewKind};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_malformed_event_does_not_stop_delivery() {
        let mock = MockLedger::new();
        let (views, _handle) = ViewClient::spawn(16);
        let generation = views.next_generation();
        views.open(generation).await.unwrap();

        let router = ChangeRouter::new(Arc::new(mock.clone()), views.handle(generation));
        let (feed, subscription) = Subscription::channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(FeedListener::new(router, subscription, shutdown.clone()).run());

        feed.send(Notification::put("/a/b/c", json!(1))).unwrap();
        feed.send(Notification::patch("/", json!("nope"))).unwrap();
        let snapshot = json!({
            "a1": {
                "invoice_number": 1, "client": "c", "address": "a", "phone": "p",
                "items": 1, "value": 1, "biller": "b", "payment_method": "m", "notes": "",
                "state": 0, "created_at": "2024-03-01T08:30:00Z"
            }
        });
        feed.send(Notification::put("/", snapshot)).unwrap();

        let mut rows = Vec::new();
        for _ in 0..100 {
            rows = views.rows(ViewKind::Invoiced).await.unwrap();
            if !rows.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(rows.len(), 1);

        shutdown.cancel();
        task.await.unwrap();
        assert!(feed.is_closed());
        mock.verify();
    }

    #[tokio::test]
    async fn test_stops_when_feed_ends() {
        let mock = MockLedger::new();
        let (views, _handle) = ViewClient::spawn(16);
        let router = ChangeRouter::new(Arc::new(mock), views.handle(views.next_generation()));
        let (feed, subscription) = Subscription::channel();
        drop(feed);

        FeedListener::new(router, subscription, CancellationToken::new())
            .run()
            .await;
    }
}
