//! Building snapshots from mail items.

use tracing::{debug, warn};

use super::convert::{BodyConverter, HtmdConverter};
use super::model::{DocumentId, DocumentSnapshot, ObjectType, SnapshotDetails};
use crate::source::MailItem;

/// Errors that can occur while converting a single mail item.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The body could not be turned into blocks.
    #[error("Failed to convert message body: {0}")]
    Body(String),

    /// The item has no source identifier to derive an id from.
    #[error("Mail item has an empty source identifier")]
    MissingSourceId,
}

/// Snapshots produced from a batch of items, plus the items that failed.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    /// Successfully built snapshots, in input order.
    pub snapshots: Vec<DocumentSnapshot>,
    /// Number of items dropped because conversion failed.
    pub failed: usize,
}

/// Turns mail items into store-ready snapshots.
pub struct SnapshotBuilder {
    converter: Box<dyn BodyConverter>,
}

impl SnapshotBuilder {
    /// Creates a builder using `converter` for message bodies.
    #[must_use]
    pub fn new(converter: impl BodyConverter + 'static) -> Self {
        Self {
            converter: Box::new(converter),
        }
    }

    /// Builds the snapshot for one item.
    ///
    /// The id depends only on `item.source_id`; every other field maps
    /// straight from the item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item has no source identifier or its body
    /// cannot be converted.
    pub fn build(&self, item: &MailItem) -> Result<DocumentSnapshot, ConversionError> {
        if item.source_id.is_empty() {
            return Err(ConversionError::MissingSourceId);
        }

        let converted = self.converter.html_to_blocks(&item.body)?;
        for warning in &converted.warnings {
            debug!(source_id = %item.source_id, warning = %warning, "Body conversion warning");
        }

        Ok(DocumentSnapshot {
            id: DocumentId::for_source(&item.source_id),
            blocks: converted.blocks,
            details: SnapshotDetails {
                name: item.topic.clone(),
                source: item.source_id.clone(),
                object_type: ObjectType::Page,
                created_at: item.sent_at,
            },
            original_created_at: item.sent_at,
        })
    }

    /// Builds snapshots for every item, logging and dropping failures.
    #[must_use]
    pub fn build_all(&self, items: &[MailItem]) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();
        for item in items {
            match self.build(item) {
                Ok(snapshot) => outcome.snapshots.push(snapshot),
                Err(e) => {
                    warn!(source_id = %item.source_id, error = %e, "Dropping message that failed conversion");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(HtmdConverter)
    }
}

impl std::fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotBuilder").finish_non_exhaustive()
    }
}
