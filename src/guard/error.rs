//! Error types for the duplicate guard.

use crate::ledger::LedgerError;
use crate::model::RecordId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GuardError {
    /// A non-deleted record already carries this invoice number.
    #[error("Invoice {invoice_number} already exists as {existing}")]
    DuplicateInvoice {
        invoice_number: u64,
        existing: RecordId,
    },

    #[error(transparent)]
    Network(#[from] LedgerError),
}
