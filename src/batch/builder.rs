//! Pure patch builders.
//!
//! Each builder takes the current state of every id involved and produces one
//! [`LedgerPatch`] covering only the ids whose transition is legal. Ids missing
//! from `current` are reported as [`SkipReason::NotFound`]. Repeated ids are
//! considered once.

use crate::batch::{BatchError, SkipReason};
use crate::ledger::LedgerPatch;
use crate::model::{ensure_transition, LifecycleError, OrderState, ProgressUpdate, RecordId};
use std::collections::{HashMap, HashSet};

/// Current state of each id as read from the ledger. Absent ids were not found.
pub type CurrentStates = HashMap<RecordId, Result<OrderState, LifecycleError>>;

/// Courier assigned to each id, as read from the ledger.
pub type Couriers = HashMap<RecordId, String>;

/// Delivery zones accepted when no other set is configured.
pub const DEFAULT_ZONES: [&str; 5] = ["Norte", "Sur", "Oriente", "Occidente", "Regiones"];

/// One row selected for dispatch with the zone it leaves for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub id: RecordId,
    pub zone: String,
}

impl DispatchTarget {
    pub fn new(id: impl Into<RecordId>, zone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            zone: zone.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedId {
    pub id: RecordId,
    pub reason: SkipReason,
}

/// A patch plus the bookkeeping of which ids made it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    pub patch: LedgerPatch,
    pub applied: Vec<RecordId>,
    pub skipped: Vec<SkippedId>,
}

impl BatchPlan {
    fn skip(&mut self, id: &RecordId, reason: SkipReason) {
        self.skipped.push(SkippedId {
            id: id.clone(),
            reason,
        });
    }

    /// Checks `id` against `current` and the edge to `target`.
    fn admit(
        &mut self,
        seen: &mut HashSet<RecordId>,
        id: &RecordId,
        current: &CurrentStates,
        target: OrderState,
    ) -> bool {
        if !seen.insert(id.clone()) {
            return false;
        }
        let verdict = match current.get(id) {
            None => Err(SkipReason::NotFound),
            Some(Err(e)) => Err(SkipReason::Rejected(e.clone())),
            Some(Ok(from)) => ensure_transition(*from, target).map_err(SkipReason::Rejected),
        };
        match verdict {
            Ok(()) => true,
            Err(reason) => {
                self.skip(id, reason);
                false
            }
        }
    }

    fn apply_state(&mut self, id: &RecordId, target: OrderState) {
        self.patch.set(id, "state", target.code());
        self.applied.push(id.clone());
    }
}

fn build_state_patch(ids: &[RecordId], current: &CurrentStates, target: OrderState) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();
    for id in ids {
        if plan.admit(&mut seen, id, current, target) {
            plan.apply_state(id, target);
        }
    }
    plan
}

/// `<id>/state = Dispatched` and `<id>/zone = zone` for every dispatchable target.
///
/// A target is dispatchable when its edge is legal, its zone is one of `zones`
/// and its record already has a courier.
pub fn build_dispatch_patch(
    targets: &[DispatchTarget],
    current: &CurrentStates,
    couriers: &Couriers,
    zones: &[String],
) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();
    for target in targets {
        if !plan.admit(&mut seen, &target.id, current, OrderState::Dispatched) {
            continue;
        }
        let zone = target.zone.trim();
        if zone.is_empty() {
            plan.skip(&target.id, SkipReason::MissingZone);
            continue;
        }
        if !zones.iter().any(|known| known == zone) {
            plan.skip(&target.id, SkipReason::UnknownZone(zone.to_string()));
            continue;
        }
        let has_courier = couriers
            .get(&target.id)
            .is_some_and(|courier| !courier.trim().is_empty());
        if !has_courier {
            plan.skip(&target.id, SkipReason::MissingCourier);
            continue;
        }
        plan.patch.set(&target.id, "zone", zone);
        plan.apply_state(&target.id, OrderState::Dispatched);
    }
    plan
}

pub fn build_delete_patch(ids: &[RecordId], current: &CurrentStates) -> BatchPlan {
    build_state_patch(ids, current, OrderState::Deleted)
}

pub fn build_pending_patch(ids: &[RecordId], current: &CurrentStates) -> BatchPlan {
    build_state_patch(ids, current, OrderState::Pending)
}

/// Pending back to Packed. Other sources, including Invoiced, are rejected.
pub fn build_release_patch(ids: &[RecordId], current: &CurrentStates) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();
    for id in ids {
        if let Some(Ok(from)) = current.get(id) {
            if *from != OrderState::Pending && seen.insert(id.clone()) {
                plan.skip(
                    id,
                    SkipReason::Rejected(LifecycleError::IllegalTransition {
                        from: *from,
                        to: OrderState::Packed,
                    }),
                );
                continue;
            }
        }
        if plan.admit(&mut seen, id, current, OrderState::Packed) {
            plan.apply_state(id, OrderState::Packed);
        }
    }
    plan
}

fn current_state(id: &RecordId, current: &CurrentStates) -> Result<OrderState, BatchError> {
    match current.get(id) {
        None => Err(BatchError::NotFound(id.clone())),
        Some(state) => Ok(state.clone()?),
    }
}

/// Invoiced to Packed, together with the packing progress fields.
pub fn build_pack_patch(
    id: &RecordId,
    current: &CurrentStates,
    progress: &ProgressUpdate,
) -> Result<LedgerPatch, BatchError> {
    let from = current_state(id, current)?;
    if from != OrderState::Invoiced {
        return Err(LifecycleError::IllegalTransition {
            from,
            to: OrderState::Packed,
        }
        .into());
    }

    let mut patch = LedgerPatch::new();
    for (field, value) in progress.fields() {
        patch.set(id, field, value);
    }
    patch.set(id, "state", OrderState::Packed.code());
    Ok(patch)
}

/// Edits progress fields of a record that is not yet terminal.
pub fn build_progress_patch(
    id: &RecordId,
    current: &CurrentStates,
    progress: &ProgressUpdate,
) -> Result<LedgerPatch, BatchError> {
    if progress.is_empty() {
        return Err(BatchError::EmptyProgress);
    }
    let state = current_state(id, current)?;
    if !state.is_mutable() {
        return Err(LifecycleError::Frozen(state).into());
    }

    let mut patch = LedgerPatch::new();
    for (field, value) in progress.fields() {
        patch.set(id, field, value);
    }
    Ok(patch)
}
