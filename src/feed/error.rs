//! Error types for change-feed handling.

use crate::framework::FrameworkError;
use crate::ledger::LedgerError;
use crate::model::RecordId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    /// The notification does not match any known path/kind shape.
    #[error("Malformed event at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// A re-read returned nothing, or something that is not a record.
    #[error("Stale reference: {0}")]
    StaleReference(RecordId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The reconciliation consumer is gone.
    #[error("View queue closed: {0}")]
    QueueClosed(#[from] FrameworkError),
}

impl FeedError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        FeedError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
