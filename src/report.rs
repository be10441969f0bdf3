//! Read-only batch reads for report generation and lookups.

use crate::ledger::{decode_documents, Ledger, LedgerError};
use crate::model::{OrderRecord, OrderState, RecordId};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ReportReader {
    ledger: Arc<dyn Ledger>,
}

impl ReportReader {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Every record whose state is in `states`, oldest first.
    /// Documents that do not decode as records are skipped.
    pub async fn read_by_states(
        &self,
        states: &[OrderState],
    ) -> Result<Vec<(RecordId, OrderRecord)>, LedgerError> {
        let mut records = Vec::new();
        for state in states.iter().copied().collect::<BTreeSet<_>>() {
            let documents = self
                .ledger
                .query_by_field("state", Value::from(state.code()))
                .await?;
            records.extend(decode_documents(documents));
        }
        sort_by_creation(&mut records);
        debug!(states = states.len(), found = records.len(), "Read by states");
        Ok(records)
    }

    /// Every record carrying `invoice_number`, whatever its state, oldest first.
    pub async fn find_by_invoice(
        &self,
        invoice_number: u64,
    ) -> Result<Vec<(RecordId, OrderRecord)>, LedgerError> {
        let documents = self
            .ledger
            .query_by_field("invoice_number", Value::from(invoice_number))
            .await?;
        let mut records = decode_documents(documents);
        sort_by_creation(&mut records);
        Ok(records)
    }
}

fn sort_by_creation(records: &mut [(RecordId, OrderRecord)]) {
    records.sort_by(|(a_id, a), (b_id, b)| a.created_at.cmp(&b.created_at).then_with(|| a_id.cmp(b_id)));
}
