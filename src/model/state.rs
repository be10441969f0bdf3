//! # Order Lifecycle
//!
//! The canonical states of a dispatch order and the edges between them.
//!
//! ```text
//! Invoiced -> Packed        Packed  -> Dispatched     Invoiced -> Deleted
//! Packed   -> Pending       Pending -> Dispatched     Packed   -> Deleted
//! Pending  -> Packed                                  Pending  -> Deleted
//! ```
//!
//! `Dispatched` and `Deleted` are terminal. States travel over the wire as the
//! integer codes used by the ledger (`Invoiced=0`, `Packed=1`, `Dispatched=2`,
//! `Pending=3`, `Deleted=-1`); an unknown code is rejected, never coerced.

use crate::model::LifecycleError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lifecycle state of an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OrderState {
    Invoiced,
    Packed,
    Dispatched,
    Pending,
    Deleted,
}

impl OrderState {
    /// Every state, in code order.
    pub const ALL: [OrderState; 5] = [
        OrderState::Deleted,
        OrderState::Invoiced,
        OrderState::Packed,
        OrderState::Dispatched,
        OrderState::Pending,
    ];

    /// Integer code stored in the ledger.
    pub fn code(self) -> i64 {
        match self {
            OrderState::Invoiced => 0,
            OrderState::Packed => 1,
            OrderState::Dispatched => 2,
            OrderState::Pending => 3,
            OrderState::Deleted => -1,
        }
    }

    /// Parses a ledger code.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UnknownState`] for any code outside the five known ones.
    pub fn from_code(code: i64) -> Result<Self, LifecycleError> {
        match code {
            0 => Ok(OrderState::Invoiced),
            1 => Ok(OrderState::Packed),
            2 => Ok(OrderState::Dispatched),
            3 => Ok(OrderState::Pending),
            -1 => Ok(OrderState::Deleted),
            other => Err(LifecycleError::UnknownState(other)),
        }
    }

    /// No edge leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderState::Dispatched | OrderState::Deleted)
    }

    /// Whether the packing/progress fields may still change.
    pub fn is_mutable(self) -> bool {
        !self.is_terminal()
    }
}

impl TryFrom<i64> for OrderState {
    type Error = LifecycleError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        OrderState::from_code(code)
    }
}

impl From<OrderState> for i64 {
    fn from(state: OrderState) -> Self {
        state.code()
    }
}

impl Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderState::Invoiced => "Invoiced",
            OrderState::Packed => "Packed",
            OrderState::Dispatched => "Dispatched",
            OrderState::Pending => "Pending",
            OrderState::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Returns `true` exactly for the legal lifecycle edges.
pub fn can_transition(from: OrderState, to: OrderState) -> bool {
    use OrderState::*;
    matches!(
        (from, to),
        (Invoiced, Packed)
            | (Packed, Pending)
            | (Pending, Packed)
            | (Packed, Dispatched)
            | (Pending, Dispatched)
            | (Invoiced, Deleted)
            | (Packed, Deleted)
            | (Pending, Deleted)
    )
}

/// Checked form of [`can_transition`].
///
/// # Errors
///
/// [`LifecycleError::IllegalTransition`] when the edge is not in the graph.
pub fn ensure_transition(from: OrderState, to: OrderState) -> Result<(), LifecycleError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition { from, to })
    }
}
