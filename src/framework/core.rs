//! # Request/Response Plumbing
//!
//! Every long-lived task in this crate (the in-process ledger, the reconciliation
//! consumer) is an actor: it owns its state, drains one `mpsc` queue and answers
//! through `oneshot` channels. This module holds the pieces they share.
//!
//! ## Key Types
//!
//! - [`Response`]: the reply half handed to an actor inside a request.
//! - [`request`]: send a request and await its reply in one call.
//! - [`FrameworkError`]: the two ways a round trip can fail.

use tokio::sync::{mpsc, oneshot};

// =============================================================================
// 1. ERRORS
// =============================================================================

/// Errors raised by the channel plumbing itself, independent of the domain.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
}

// =============================================================================
// 2. RESPONSES
// =============================================================================

/// Type alias for the one-shot response channel carried by actor requests.
///
/// Unlike a plain CRUD actor, replies here are whatever the operation returns
/// (often a domain `Result`), so the alias does not wrap `T` a second time.
pub type Response<T> = oneshot::Sender<T>;

/// Sends a request built around a fresh reply channel and awaits the answer.
///
/// `build` receives the [`Response`] half and returns the message to enqueue.
///
/// # Errors
///
/// - [`FrameworkError::ActorClosed`] if the actor's receiver is gone.
/// - [`FrameworkError::ActorDropped`] if the actor dropped the reply without answering.
pub async fn request<M, T>(
    sender: &mpsc::Sender<M>,
    build: impl FnOnce(Response<T>) -> M,
) -> Result<T, FrameworkError> {
    let (respond_to, response) = oneshot::channel();
    sender
        .send(build(respond_to))
        .await
        .map_err(|_| FrameworkError::ActorClosed)?;
    response.await.map_err(|_| FrameworkError::ActorDropped)
}

/// Extracts the short type name used as the `actor` field in logs
/// (e.g. `LedgerActor` instead of `dispatch_sync::ledger::memory::LedgerActor`).
pub(crate) fn short_type_name<T>() -> &'static str {
    std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("Unknown")
}
