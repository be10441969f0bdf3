//! Bulk user actions as atomic multi-record patches.
//!
//! # Main Components
//!
//! - [`builder`] - Pure functions from current states to a [`BatchPlan`]
//! - [`BatchMutator`] - Reads states from the ledger and submits the patch
//! - [`SkipReason`] - Why an id was left out of a batch

pub mod builder;
pub mod error;
pub mod mutator;

pub use builder::{
    build_delete_patch, build_dispatch_patch, build_pack_patch, build_pending_patch,
    build_progress_patch, build_release_patch, BatchPlan, Couriers, CurrentStates, DispatchTarget,
    SkippedId, DEFAULT_ZONES,
};
pub use error::{BatchError, SkipReason};
pub use mutator::{BatchMutator, BatchOutcome};
