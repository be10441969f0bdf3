//! Error types for ledger calls.

use crate::framework::FrameworkError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// The remote call failed (connectivity, permissions, timeouts).
    #[error("Ledger network error: {0}")]
    Network(String),

    /// The ledger task is gone.
    #[error("Ledger unavailable: {0}")]
    Closed(#[from] FrameworkError),

    /// A patch key is not `<id>` or `<id>/<field>`.
    #[error("Invalid ledger path: {0}")]
    InvalidPath(String),

    /// A record could not be encoded as a document.
    #[error("Encoding error: {0}")]
    Encoding(String),
}
