//! Error types for batch mutations.

use crate::ledger::LedgerError;
use crate::model::{LifecycleError, RecordId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BatchError {
    #[error(transparent)]
    Network(#[from] LedgerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Progress update has no fields")]
    EmptyProgress,
}

/// Why an id was left out of a multi-record patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkipReason {
    /// The current state does not allow the transition (or could not be read).
    #[error(transparent)]
    Rejected(LifecycleError),

    #[error("record not found")]
    NotFound,

    #[error("zone is empty")]
    MissingZone,

    #[error("unknown zone '{0}'")]
    UnknownZone(String),

    #[error("no courier assigned")]
    MissingCourier,
}
