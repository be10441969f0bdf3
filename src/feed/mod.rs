//! Change-feed handling: classification, routing and the listener task.
//!
//! # Main Components
//!
//! - [`classify`] - Pure mapping from a ledger [`Notification`](crate::ledger::Notification) to a [`ChangeEvent`]
//! - [`ChangeRouter`] - Re-reads affected records and enqueues projection commands
//! - [`FeedListener`] - Cancellable task draining one subscription into the router

pub mod error;
pub mod event;
pub mod listener;
pub mod router;

pub use error::FeedError;
pub use event::{classify, ChangeEvent};
pub use listener::FeedListener;
pub use router::ChangeRouter;
