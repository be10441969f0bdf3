//! Actor plumbing shared by the ledger and the reconciliation consumer.
//!
//! # Main Components
//!
//! - [`Response`] - Reply channel carried inside actor requests
//! - [`request`] - Send-and-await helper used by every typed client
//! - [`FrameworkError`] - Channel failures (actor closed / reply dropped)
//!
//! # Testing
//!
//! See [`crate::ledger::mock`] for an expectation-driven ledger used in tests.

pub mod core;

pub use core::*;
