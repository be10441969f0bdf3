//! Error types for the order model.

use crate::model::OrderState;
use thiserror::Error;

/// Errors raised by the lifecycle rules and record validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The ledger carried a state code outside the known set.
    #[error("Unknown state code: {0}")]
    UnknownState(i64),

    /// The requested edge is not part of the lifecycle graph.
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: OrderState, to: OrderState },

    /// Progress fields cannot change once the record is terminal.
    #[error("Record is frozen in state {0}")]
    Frozen(OrderState),

    /// Extracted or stored data failed validation.
    #[error("Validation error: {0}")]
    ValidationError(String),
}
