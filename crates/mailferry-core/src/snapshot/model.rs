//! Snapshot data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for content-addressed document ids.
pub const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6d61_696c_6665_4000_8000_0000_646f_6373);

/// Identifier of a document in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Derives the id for a mail item from its source identifier.
    ///
    /// A version 5 UUID over [`DOCUMENT_NAMESPACE`]; the same input always
    /// produces the same id.
    #[must_use]
    pub fn for_source(source_id: &str) -> Self {
        Self(Uuid::new_v5(&DOCUMENT_NAMESPACE, source_id.as_bytes()))
    }

    /// A fresh random id, for documents not derived from mail.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of document in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// A page with structured content; what imported mail becomes.
    #[default]
    Page,
    /// A short note without a title.
    Note,
}

impl ObjectType {
    /// Storage name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Note => "note",
        }
    }

    /// Parses a storage name, defaulting to [`ObjectType::Page`].
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "note" => Self::Note,
            _ => Self::Page,
        }
    }
}

/// One structured content block of a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Running text.
    Paragraph {
        /// Text content.
        text: String,
    },
    /// Section heading.
    Heading {
        /// Level from 1 (largest) to 6.
        level: u8,
        /// Heading text.
        text: String,
    },
    /// Item of an unordered list.
    Bulleted {
        /// Item text.
        text: String,
    },
    /// Item of an ordered list.
    Numbered {
        /// Item text.
        text: String,
    },
    /// Quoted text.
    Quote {
        /// Quoted content.
        text: String,
    },
    /// Preformatted code.
    Code {
        /// Language hint from the fence, if any.
        language: Option<String>,
        /// Code content.
        text: String,
    },
    /// Horizontal rule.
    Divider,
}

/// Metadata attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDetails {
    /// Display name (the mail subject).
    pub name: String,
    /// Source identifier of the originating mail item.
    pub source: String,
    /// Document type.
    pub object_type: ObjectType,
    /// Creation time shown in the store.
    pub created_at: DateTime<Utc>,
}

/// A self-contained, store-ready document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Content-addressed id.
    pub id: DocumentId,
    /// Structured body.
    pub blocks: Vec<Block>,
    /// Metadata.
    pub details: SnapshotDetails,
    /// When the original item was created (the mail's sent time).
    pub original_created_at: DateTime<Utc>,
}
