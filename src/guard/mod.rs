//! # Duplicate Guard
//!
//! Write-path check that keeps invoice numbers unique among live records.
//! A record in state `Deleted` never blocks; any other match does, including a
//! match whose state cannot be read.
//!
//! The check and the insert are two separate ledger calls, so two clients
//! ingesting the same invoice at the same instant can both pass the check.

pub mod error;

pub use error::GuardError;

use crate::ledger::Ledger;
use crate::model::{NewOrder, OrderRecord, OrderState, RecordId};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedOrder {
    pub id: RecordId,
    pub record: OrderRecord,
}

#[derive(Clone)]
pub struct DuplicateGuard {
    ledger: Arc<dyn Ledger>,
}

impl DuplicateGuard {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Inserts `order` as a new `Invoiced` record unless a live record already
    /// carries its invoice number.
    ///
    /// # Errors
    ///
    /// - [`GuardError::DuplicateInvoice`] with the id of the blocking record. Nothing is written.
    /// - [`GuardError::Network`] if the query or the insert fails.
    #[tracing::instrument(skip_all, fields(invoice_number = order.invoice_number))]
    pub async fn try_insert(&self, order: NewOrder) -> Result<InsertedOrder, GuardError> {
        let invoice_number = order.invoice_number;
        let matches = self
            .ledger
            .query_by_field("invoice_number", Value::from(invoice_number))
            .await?;

        let deleted = OrderState::Deleted.code();
        if let Some((existing, _)) = matches
            .iter()
            .find(|(_, doc)| doc.get("state").and_then(Value::as_i64) != Some(deleted))
        {
            warn!(%existing, "Duplicate invoice rejected");
            return Err(GuardError::DuplicateInvoice {
                invoice_number,
                existing: existing.clone(),
            });
        }

        let record = OrderRecord::invoiced(order, Utc::now());
        let id = self.ledger.insert(record.clone()).await?;
        info!(%id, "Order inserted");
        Ok(InsertedOrder { id, record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::{Documents, LedgerError};
    use serde_json::json;

    fn order(invoice_number: u64) -> NewOrder {
        NewOrder {
            invoice_number,
            client: "Drogueria Alfa".to_string(),
            address: "Cl 1 # 1-1".to_string(),
            phone: "3100000000".to_string(),
            items: 6,
            value: 75_000,
            biller: "ana".to_string(),
            payment_method: "Contado".to_string(),
            notes: String::new(),
        }
    }

    fn live_docs(entries: &[(&str, i64)]) -> Documents {
        entries
            .iter()
            .map(|(id, state)| (RecordId::from(*id), json!({"invoice_number": 1001, "state": state})))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_when_no_match() {
        let mock = MockLedger::new();
        mock.expect_query_by_field("invoice_number").return_ok(Documents::new());
        mock.expect_insert().return_ok(RecordId::from("new1"));

        let guard = DuplicateGuard::new(Arc::new(mock.clone()));
        let inserted = guard.try_insert(order(1001)).await.unwrap();

        assert_eq!(inserted.id, RecordId::from("new1"));
        assert_eq!(inserted.record.state, OrderState::Invoiced);
        assert_eq!(mock.inserted().len(), 1);
        mock.verify();
    }

    #[tokio::test]
    async fn test_live_match_rejects_without_insert() {
        let mock = MockLedger::new();
        mock.expect_query_by_field("invoice_number")
            .return_ok(live_docs(&[("old", -1), ("live", 1)]));

        let guard = DuplicateGuard::new(Arc::new(mock.clone()));
        let result = guard.try_insert(order(1001)).await;

        assert_eq!(
            result,
            Err(GuardError::DuplicateInvoice {
                invoice_number: 1001,
                existing: RecordId::from("live")
            })
        );
        assert!(mock.inserted().is_empty());
        mock.verify();
    }

    #[tokio::test]
    async fn test_deleted_records_never_block() {
        let mock = MockLedger::new();
        mock.expect_query_by_field("invoice_number")
            .return_ok(live_docs(&[("gone1", -1), ("gone2", -1)]));
        mock.expect_insert().return_ok(RecordId::from("again"));

        let guard = DuplicateGuard::new(Arc::new(mock.clone()));
        assert!(guard.try_insert(order(1001)).await.is_ok());
        mock.verify();
    }

    #[tokio::test]
    async fn test_unreadable_state_blocks() {
        let mock = MockLedger::new();
        let mut docs = Documents::new();
        docs.insert(RecordId::from("odd"), json!({"invoice_number": 1001}));
        mock.expect_query_by_field("invoice_number").return_ok(docs);

        let guard = DuplicateGuard::new(Arc::new(mock.clone()));
        assert!(matches!(
            guard.try_insert(order(1001)).await,
            Err(GuardError::DuplicateInvoice { .. })
        ));
        mock.verify();
    }

    #[tokio::test]
    async fn test_ledger_failure_is_network_error() {
        let mock = MockLedger::new();
        mock.expect_query_by_field("invoice_number")
            .return_err(LedgerError::Network("unreachable".to_string()));

        let guard = DuplicateGuard::new(Arc::new(mock.clone()));
        assert_eq!(
            guard.try_insert(order(1001)).await,
            Err(GuardError::Network(LedgerError::Network("unreachable".to_string())))
        );
        mock.verify();
    }
}
