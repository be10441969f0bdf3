//! Reads current states, builds a patch and submits it as one atomic write.

use crate::batch::builder::{
    build_delete_patch, build_dispatch_patch, build_pack_patch, build_pending_patch,
    build_progress_patch, build_release_patch, BatchPlan, Couriers, CurrentStates, DispatchTarget,
    SkippedId, DEFAULT_ZONES,
};
use crate::batch::BatchError;
use crate::ledger::{Ledger, LedgerPatch};
use crate::model::{LifecycleError, OrderState, ProgressUpdate, RecordId};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a bulk action did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub applied: Vec<RecordId>,
    pub skipped: Vec<SkippedId>,
}

#[derive(Clone)]
pub struct BatchMutator {
    ledger: Arc<dyn Ledger>,
    zones: Vec<String>,
}

fn state_of(document: &Value) -> Result<OrderState, LifecycleError> {
    let code = document
        .get("state")
        .and_then(Value::as_i64)
        .ok_or_else(|| LifecycleError::ValidationError("record has no state code".to_string()))?;
    OrderState::from_code(code)
}

impl BatchMutator {
    /// A mutator accepting the [`DEFAULT_ZONES`] for dispatch.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            zones: DEFAULT_ZONES.iter().map(|zone| zone.to_string()).collect(),
        }
    }

    pub fn with_zones(mut self, zones: Vec<String>) -> Self {
        self.zones = zones;
        self
    }

    #[tracing::instrument(skip_all, fields(count = targets.len()))]
    pub async fn dispatch(&self, targets: &[DispatchTarget]) -> Result<BatchOutcome, BatchError> {
        let (current, couriers) = self.read_records(targets.iter().map(|t| &t.id)).await?;
        let plan = build_dispatch_patch(targets, &current, &couriers, &self.zones);
        self.submit("dispatch", plan).await
    }

    #[tracing::instrument(skip_all, fields(count = ids.len()))]
    pub async fn delete(&self, ids: &[RecordId]) -> Result<BatchOutcome, BatchError> {
        let current = self.read_states(ids.iter()).await?;
        self.submit("delete", build_delete_patch(ids, &current)).await
    }

    #[tracing::instrument(skip_all, fields(count = ids.len()))]
    pub async fn mark_pending(&self, ids: &[RecordId]) -> Result<BatchOutcome, BatchError> {
        let current = self.read_states(ids.iter()).await?;
        self.submit("mark_pending", build_pending_patch(ids, &current)).await
    }

    #[tracing::instrument(skip_all, fields(count = ids.len()))]
    pub async fn release(&self, ids: &[RecordId]) -> Result<BatchOutcome, BatchError> {
        let current = self.read_states(ids.iter()).await?;
        self.submit("release", build_release_patch(ids, &current)).await
    }

    /// Marks an invoiced record as packed and records the packing details.
    #[tracing::instrument(skip_all, fields(%id))]
    pub async fn pack(&self, id: &RecordId, progress: &ProgressUpdate) -> Result<(), BatchError> {
        let current = self.read_states(std::iter::once(id)).await?;
        let patch = build_pack_patch(id, &current, progress)?;
        self.write("pack", patch).await
    }

    #[tracing::instrument(skip_all, fields(%id))]
    pub async fn update_progress(
        &self,
        id: &RecordId,
        progress: &ProgressUpdate,
    ) -> Result<(), BatchError> {
        let current = self.read_states(std::iter::once(id)).await?;
        let patch = build_progress_patch(id, &current, progress)?;
        self.write("update_progress", patch).await
    }

    async fn read_states<'a>(
        &self,
        ids: impl Iterator<Item = &'a RecordId>,
    ) -> Result<CurrentStates, BatchError> {
        Ok(self.read_records(ids).await?.0)
    }

    async fn read_records<'a>(
        &self,
        ids: impl Iterator<Item = &'a RecordId>,
    ) -> Result<(CurrentStates, Couriers), BatchError> {
        let mut current = CurrentStates::new();
        let mut couriers = Couriers::new();
        for id in ids {
            if current.contains_key(id) {
                continue;
            }
            match self.ledger.read_child(id).await? {
                Some(document) => {
                    if let Some(courier) = document.get("courier").and_then(Value::as_str) {
                        couriers.insert(id.clone(), courier.to_string());
                    }
                    current.insert(id.clone(), state_of(&document));
                }
                None => debug!(%id, "Record not found"),
            }
        }
        Ok((current, couriers))
    }

    async fn submit(&self, action: &'static str, plan: BatchPlan) -> Result<BatchOutcome, BatchError> {
        for skipped in &plan.skipped {
            warn!(action, id = %skipped.id, reason = %skipped.reason, "Skipped");
        }
        if plan.patch.is_empty() {
            debug!(action, "Nothing to submit");
        } else {
            self.write(action, plan.patch).await?;
        }
        Ok(BatchOutcome {
            applied: plan.applied,
            skipped: plan.skipped,
        })
    }

    async fn write(&self, action: &'static str, patch: LedgerPatch) -> Result<(), BatchError> {
        let keys = patch.len();
        let records = patch.ids().len();
        self.ledger.patch_multiple(patch).await?;
        info!(action, records, keys, "Batch submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::SkipReason;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::LedgerError;
    use serde_json::json;

    fn doc(state: OrderState) -> Option<Value> {
        Some(json!({"state": state.code()}))
    }

    fn assigned(state: OrderState, courier: &str) -> Option<Value> {
        Some(json!({"state": state.code(), "courier": courier}))
    }

    #[tokio::test]
    async fn test_dispatch_submits_only_legal_ids() {
        let mock = MockLedger::new();
        mock.expect_read_child("x").return_ok(assigned(OrderState::Packed, "pedro"));
        mock.expect_read_child("y").return_ok(assigned(OrderState::Deleted, "pedro"));
        mock.expect_patch().return_ok(());

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let outcome = mutator
            .dispatch(&[DispatchTarget::new("x", "Norte"), DispatchTarget::new("y", "Norte")])
            .await
            .unwrap();

        assert_eq!(outcome.applied, vec![RecordId::from("x")]);
        assert_eq!(outcome.skipped.len(), 1);
        let patches = mock.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].get("x/state"), Some(&json!(2)));
        assert!(patches[0].get("y/state").is_none());
        mock.verify();
    }

    #[tokio::test]
    async fn test_dispatch_checks_zone_and_courier() {
        let mock = MockLedger::new();
        mock.expect_read_child("x").return_ok(doc(OrderState::Packed));
        mock.expect_read_child("m").return_ok(assigned(OrderState::Packed, "pedro"));
        mock.expect_read_child("k").return_ok(assigned(OrderState::Pending, "ana"));
        mock.expect_patch().return_ok(());

        let mutator = BatchMutator::new(Arc::new(mock.clone()))
            .with_zones(vec!["Norte".to_string(), "Centro".to_string()]);
        let outcome = mutator
            .dispatch(&[
                DispatchTarget::new("x", "Norte"),
                DispatchTarget::new("m", "Sur"),
                DispatchTarget::new("k", "Centro"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.applied, vec![RecordId::from("k")]);
        let reasons: Vec<_> = outcome.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::MissingCourier, SkipReason::UnknownZone("Sur".to_string())]
        );
        let patch = &mock.patches()[0];
        assert_eq!(patch.get("k/zone"), Some(&json!("Centro")));
        assert!(patch.get("x/state").is_none());
        mock.verify();
    }

    #[tokio::test]
    async fn test_empty_patch_not_submitted() {
        let mock = MockLedger::new();
        mock.expect_read_child("gone").return_ok(None);

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let outcome = mutator.delete(&[RecordId::from("gone")]).await.unwrap();

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped[0].reason, SkipReason::NotFound);
        assert!(mock.patches().is_empty());
        mock.verify();
    }

    #[tokio::test]
    async fn test_unreadable_state_is_skipped() {
        let mock = MockLedger::new();
        mock.expect_read_child("odd").return_ok(Some(json!({"state": 17})));

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let outcome = mutator.mark_pending(&[RecordId::from("odd")]).await.unwrap();

        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::Rejected(LifecycleError::UnknownState(17))
        );
        mock.verify();
    }

    #[tokio::test]
    async fn test_read_failure_aborts_batch() {
        let mock = MockLedger::new();
        mock.expect_read_child("a").return_err(LedgerError::Network("offline".to_string()));

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let result = mutator.release(&[RecordId::from("a"), RecordId::from("b")]).await;

        assert_eq!(
            result,
            Err(BatchError::Network(LedgerError::Network("offline".to_string())))
        );
        assert!(mock.patches().is_empty());
        mock.verify();
    }

    #[tokio::test]
    async fn test_pack_writes_state_and_progress() {
        let mock = MockLedger::new();
        mock.expect_read_child("a").return_ok(doc(OrderState::Invoiced));
        mock.expect_patch().return_ok(());

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let progress = ProgressUpdate::default().with_packer("luis").with_packages(1, 2, 0);
        mutator.pack(&RecordId::from("a"), &progress).await.unwrap();

        let patch = &mock.patches()[0];
        assert_eq!(patch.get("a/state"), Some(&json!(1)));
        assert_eq!(patch.get("a/bags"), Some(&json!(2)));
        mock.verify();
    }

    #[tokio::test]
    async fn test_update_progress_on_frozen_record() {
        let mock = MockLedger::new();
        mock.expect_read_child("d").return_ok(doc(OrderState::Deleted));

        let mutator = BatchMutator::new(Arc::new(mock.clone()));
        let progress = ProgressUpdate::default().with_observations("roto");
        let result = mutator.update_progress(&RecordId::from("d"), &progress).await;

        assert_eq!(
            result,
            Err(BatchError::Lifecycle(LifecycleError::Frozen(OrderState::Deleted)))
        );
        mock.verify();
    }
}
