//! # Ingestion
//!
//! New orders arrive as documents dropped into a shared source (a folder of
//! invoices, a mailbox). An external extractor turns each document into a map of
//! text fields; this module normalizes those fields, runs them through the
//! [`DuplicateGuard`](crate::guard::DuplicateGuard) and discards consumed documents.
//!
//! - [`IngestionSource`]: the seam to the document source.
//! - [`MemoryIngestion`]: an in-process source for the binary and tests.
//! - [`IngestionWorker`]: the periodic task.

pub mod error;
pub mod fields;
pub mod worker;

pub use error::IngestError;
pub use fields::normalize;
pub use worker::{IngestReport, IngestionWorker};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of a source document (a file name, a message id).
pub type SourceId = String;

/// Text fields extracted from one document, by field name.
pub type ExtractedFields = BTreeMap<String, String>;

#[async_trait]
pub trait IngestionSource: Send + Sync {
    /// Documents not yet consumed, with their extracted fields.
    async fn poll_new_documents(&self) -> Result<BTreeMap<SourceId, ExtractedFields>, IngestError>;

    /// Removes a consumed document from the source.
    async fn discard(&self, source: &SourceId) -> Result<(), IngestError>;
}

/// In-process document source.
#[derive(Debug, Default)]
pub struct MemoryIngestion {
    documents: Mutex<BTreeMap<SourceId, ExtractedFields>>,
}

impl MemoryIngestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a document into the source.
    pub fn add(&self, source: impl Into<SourceId>, fields: ExtractedFields) {
        self.lock().insert(source.into(), fields);
    }

    /// Ids of documents still waiting.
    pub fn remaining(&self) -> Vec<SourceId> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SourceId, ExtractedFields>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IngestionSource for MemoryIngestion {
    async fn poll_new_documents(&self) -> Result<BTreeMap<SourceId, ExtractedFields>, IngestError> {
        Ok(self.lock().clone())
    }

    async fn discard(&self, source: &SourceId) -> Result<(), IngestError> {
        self.lock()
            .remove(source)
            .map(|_| ())
            .ok_or_else(|| IngestError::Source(format!("unknown document '{source}'")))
    }
}
