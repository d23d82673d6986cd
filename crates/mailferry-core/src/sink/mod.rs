//! Interfaces to the downstream document store.
//!
//! The scheduler hands every tick's batch to an [`IngestionSink`]. Imports
//! are idempotent per [`DocumentId`]: importing a snapshot whose id already
//! exists updates the stored document instead of adding a second one.

use async_trait::async_trait;

use crate::snapshot::{DocumentId, DocumentSnapshot};

/// Errors reported by a document store.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The store could not be opened for this account or secret.
    #[error("Session error: {0}")]
    Session(String),

    /// The store rejected a document.
    #[error("Document {id} rejected: {reason}")]
    Rejected {
        /// Offending document.
        id: DocumentId,
        /// Why it was rejected.
        reason: String,
    },

    /// Stored data could not be read back.
    #[error("Corrupt stored document: {0}")]
    Corrupt(String),
}

/// How a batch import treats existing documents and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace documents whose id already exists.
    pub update_existing: bool,
    /// Skip documents that fail instead of aborting the whole batch.
    pub ignore_errors: bool,
    /// Suppress per-document progress reporting.
    pub no_progress: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            update_existing: true,
            ignore_errors: true,
            no_progress: true,
        }
    }
}

/// Per-batch import counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Documents that did not exist before.
    pub created: usize,
    /// Existing documents that were replaced.
    pub updated: usize,
    /// Existing documents left alone because updates were disabled.
    pub skipped: usize,
    /// Documents that failed and were ignored.
    pub failed: usize,
}

impl ImportSummary {
    /// Total number of documents processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Bulk import of snapshots into a document store.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Imports a batch of snapshots, upserting by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch as a whole could not be imported.
    async fn import(
        &self,
        batch: Vec<DocumentSnapshot>,
        options: ImportOptions,
    ) -> Result<ImportSummary, SinkError>;
}

/// Lookup of documents by the source identifier they were created from.
#[async_trait]
pub trait SourceLookup: Send + Sync {
    /// Finds the document created for `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    async fn find_by_source(&self, source: &str) -> Result<Option<DocumentId>, SinkError>;

    /// Returns the document for `source`, creating an empty note when none
    /// exists. The flag is true when a document was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query or insert fails.
    async fn get_or_create_by_source(&self, source: &str) -> Result<(DocumentId, bool), SinkError>;
}
