//! Error types for ingestion.

use crate::framework::FrameworkError;
use crate::model::LifecycleError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    /// Extracted fields could not be turned into an order.
    #[error(transparent)]
    Validation(#[from] LifecycleError),

    /// The ingestion source failed to list or discard documents.
    #[error("Ingestion source error: {0}")]
    Source(String),

    #[error("View queue closed: {0}")]
    QueueClosed(#[from] FrameworkError),
}
