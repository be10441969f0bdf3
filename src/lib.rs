//! # Dispatch Sync
//!
//! > **Keeping several dispatch desks in agreement about every order.**
//!
//! A warehouse runs a handful of client instances (the billing desk, the packing
//! tablet, the dispatch desk) against one shared, event-streaming document store:
//! the **ledger**. Each client shows two tables, orders waiting to be packed and the
//! dispatch queue, and any client may change any order at any time. This crate is the
//! core that keeps those tables consistent with the ledger.
//!
//! ## 🏗️ Design
//!
//! ### The ledger is the only truth
//! Tables are private caches. Every change a client makes goes to the ledger as one
//! atomic patch, and comes back to *every* client (the originator included) through
//! the change feed. No client edits its own tables directly after a write.
//!
//! ### Re-read, never trust the payload
//! A notification only says *which* records changed. The router re-reads each full
//! record and decides from its current state, so a table row is always a whole,
//! current record.
//!
//! ### One owner per table set
//! Each client runs a single reconciliation consumer that owns both tables and
//! applies commands in arrival order. Producers only enqueue. Commands are tagged
//! with a session generation, so a late result from a closed session is dropped.
//!
//! ### Type-Safe Error Handling
//! Each module defines its own `thiserror` enum (`LedgerError`, `FeedError`,
//! `GuardError`, `BatchError`, `IngestError`, `SessionError`) with `#[from]`
//! conversions, so callers can match on the exact failure.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. Data ([`model`])
//! The fixed-field [`OrderRecord`](model::OrderRecord), the lifecycle
//! [`OrderState`](model::OrderState) and [`can_transition`](model::can_transition).
//!
//! ### 2. The Store ([`ledger`])
//! The async [`Ledger`](ledger::Ledger) seam, an in-process
//! [`MemoryLedger`](ledger::MemoryLedger) actor and a [`MockLedger`](ledger::mock::MockLedger).
//!
//! ### 3. Read Path ([`feed`], [`view`])
//! [`classify`](feed::classify) turns notifications into events,
//! [`ChangeRouter`](feed::ChangeRouter) turns events into commands, and the
//! [`ReconcilerActor`](view::ReconcilerActor) applies them to the
//! [`Projection`](view::Projection)s.
//!
//! ### 4. Write Path ([`guard`], [`batch`], [`ingest`])
//! The [`DuplicateGuard`](guard::DuplicateGuard) keeps invoice numbers unique, the
//! [`BatchMutator`](batch::BatchMutator) submits bulk actions, and the
//! [`IngestionWorker`](ingest::IngestionWorker) feeds new invoices in.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! [`DispatchClient`](lifecycle::DispatchClient) owns the tasks and exposes the
//! user operations; [`setup_tracing`](lifecycle::setup_tracing) configures logs.
//!
//! ### 6. Reporting ([`report`])
//! Read-only batch reads for the report generator.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Two clients sharing one in-process ledger
//! RUST_LOG=info cargo run
//!
//! cargo test
//! ```

pub mod batch;
pub mod feed;
pub mod framework;
pub mod guard;
pub mod ingest;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod report;
pub mod view;
