//! Local table projections and the consumer that keeps them in sync.
//!
//! # Main Components
//!
//! - [`Projection`] - One table's rows, idempotent insert/update/removal/bulk load
//! - [`ReconcilerActor`] - The single task that owns both projections
//! - [`ViewClient`] / [`ViewHandle`] - Session-side client and producer-side handle

pub mod projection;
pub mod reconciler;

pub use projection::*;
pub use reconciler::*;
