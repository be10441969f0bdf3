//! # Client Lifecycle
//!
//! Wiring of one client instance: configuration, the connect/disconnect cycle and
//! the user-facing operations.
//!
//! ## Task layout per client
//!
//! ```text
//!                   ┌──────────────────────┐
//!   ledger feed ───►│ FeedListener          │──┐
//!                   └──────────────────────┘  │  ViewCommand (tagged with generation)
//!                   ┌──────────────────────┐  ├──────────────►┌──────────────────┐
//!   source docs ───►│ IngestionWorker       │──┘               │ ReconcilerActor  │
//!                   └──────────────────────┘                  │ (both tables)    │
//!   refresh_* ──────────────────────────────────────────────►└──────────────────┘
//! ```
//!
//! The listener and the worker exist only while connected; the consumer lives as
//! long as the [`DispatchClient`]. Bulk actions write to the ledger from the
//! caller's task and come back to every client, the originator included, through
//! the change feed.

pub mod config;
pub mod session;
pub mod tracing;

pub use config::SessionConfig;
pub use session::{DispatchClient, SessionError};
pub use self::tracing::setup_tracing;
