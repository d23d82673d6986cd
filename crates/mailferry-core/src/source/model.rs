//! Mail source data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of a configured mail source.
///
/// Used as the key for per-source checkpoint state, so it must not change
/// between runs for the same source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single message as returned by a mail source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    /// Identifier of the message, unique within its source.
    pub source_id: String,
    /// Subject line.
    pub topic: String,
    /// Raw HTML body.
    pub body: String,
    /// When the message was sent.
    pub sent_at: DateTime<Utc>,
    /// Whether the user flagged the message.
    pub flagged: bool,
}

impl MailItem {
    /// Creates an unflagged mail item.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        topic: impl Into<String>,
        body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            topic: topic.into(),
            body: body.into(),
            sent_at,
            flagged: false,
        }
    }

    /// Sets the flagged attribute.
    #[must_use]
    pub const fn with_flagged(mut self, flagged: bool) -> Self {
        self.flagged = flagged;
        self
    }
}
