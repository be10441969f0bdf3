//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging for the binary and for any
//! embedding application that wants the crate's default output.
//!
//! ## Configuration
//!
//! Levels come from `RUST_LOG`. The compact format hides module paths
//! (`with_target(false)`); long-lived tasks log an `actor` field instead.
//!
//! ```bash
//! # Lifecycle only: connects, snapshots, submitted batches
//! RUST_LOG=info cargo run
//!
//! # Every routed notification and projection command
//! RUST_LOG=debug cargo run
//!
//! # Just the change feed
//! RUST_LOG=dispatch_sync::feed=debug cargo run
//! ```
//!
//! ## What Gets Logged
//!
//! - **Task lifecycle**: ledger actor, reconciliation consumer, feed listener and
//!   ingestion worker start and stop.
//! - **Sessions**: connect and disconnect with the session generation.
//! - **Writes**: inserted orders, rejected duplicates, submitted batches and the ids
//!   each batch skipped (with the reason).
//! - **Dropped work**: malformed notifications, stale references, failed re-reads.
//!
//! A typical dispatch round at `info`:
//!
//! ```text
//! INFO Connected user="bodega" generation=1
//! INFO Applying snapshot invoiced=30 packed_pending=20
//! WARN dispatch{count=2}: Skipped action="dispatch" id=0190... reason=Illegal transition: Deleted -> Dispatched
//! INFO dispatch{count=2}: Batch submitted action="dispatch" records=1 keys=2
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
