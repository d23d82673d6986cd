//! Document store data models.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::snapshot::{Block, DocumentId, ObjectType};

/// Prefix mixed into the secret before hashing.
const FINGERPRINT_DOMAIN: &str = "mailferry-session-v1:";

/// Account identity and secret used to open a store.
#[derive(Clone)]
pub struct SessionCredentials {
    account_id: String,
    mnemonic: String,
}

impl SessionCredentials {
    /// Creates session credentials.
    #[must_use]
    pub fn new(account_id: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            mnemonic: mnemonic.into(),
        }
    }

    /// The account this session belongs to.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Hex SHA-256 fingerprint of the secret; the secret itself is never stored.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN.as_bytes());
        hasher.update(self.mnemonic.trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("account_id", &self.account_id)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Document id.
    pub id: DocumentId,
    /// Document type.
    pub object_type: ObjectType,
    /// Display name.
    pub name: String,
    /// Source identifier the document was created from.
    pub source: String,
    /// Free-text description.
    pub description: String,
    /// Structured body.
    pub blocks: Vec<Block>,
    /// Creation time shown in the store.
    pub created_at: DateTime<Utc>,
    /// Creation time of the original item, if imported.
    pub original_created_at: Option<DateTime<Utc>>,
    /// Number of times the document has been written.
    pub revision: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_secret_dependent() {
        let a = SessionCredentials::new("acc", "alpha beta gamma");
        let b = SessionCredentials::new("acc", " alpha beta gamma ");
        let c = SessionCredentials::new("acc", "alpha beta delta");

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let session = SessionCredentials::new("acc", "very secret words");
        let debug = format!("{session:?}");
        assert!(debug.contains("acc"));
        assert!(!debug.contains("secret words"));
    }
}
