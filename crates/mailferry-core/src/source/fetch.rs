//! Fetching a time window from a source and selecting ingestion-worthy items.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::model::{MailItem, SourceId};
use crate::checkpoint::TimeWindow;

/// Errors that can occur while reading a mail source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source could not be reached.
    #[error("Mail source unavailable: {0}")]
    Unavailable(String),

    /// The source returned data that could not be understood.
    #[error("Malformed data from mail source: {0}")]
    Malformed(String),

    /// I/O error while reading the source.
    #[error("I/O error while reading mail: {0}")]
    Io(#[from] std::io::Error),
}

/// A provider of mail items, queried by sent date.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Stable identity of this source.
    fn id(&self) -> &SourceId;

    /// Lists the messages sent in `[start, end)`, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreachable or returns malformed data.
    async fn mail_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MailItem>, FetchError>;
}

/// Predicate deciding which fetched items get ingested.
#[derive(Clone, Default)]
pub enum Selector {
    /// Only flagged messages.
    #[default]
    Flagged,
    /// Only messages that are not flagged.
    Unflagged,
    /// Every message.
    All,
    /// A caller-supplied predicate.
    Custom(Arc<dyn Fn(&MailItem) -> bool + Send + Sync>),
}

impl Selector {
    /// Wraps an arbitrary predicate.
    pub fn custom(predicate: impl Fn(&MailItem) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Returns true if the item should be ingested.
    #[must_use]
    pub fn matches(&self, item: &MailItem) -> bool {
        match self {
            Self::Flagged => item.flagged,
            Self::Unflagged => !item.flagged,
            Self::All => true,
            Self::Custom(predicate) => predicate(item),
        }
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flagged => f.write_str("Flagged"),
            Self::Unflagged => f.write_str("Unflagged"),
            Self::All => f.write_str("All"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Fetches one window from `source` and keeps the items accepted by
/// `selector`.
///
/// Items the source returns outside of the window are dropped, so a source
/// with coarse date filtering cannot leak messages into a neighbouring
/// window. Arrival order is preserved.
///
/// # Errors
///
/// Propagates the source's [`FetchError`]; the caller must not advance the
/// source's checkpoint in that case.
pub async fn fetch_and_filter(
    source: &dyn MailSource,
    window: TimeWindow,
    selector: &Selector,
) -> Result<Vec<MailItem>, FetchError> {
    let mut items = source.mail_by_date(window.start, window.end).await?;
    let fetched = items.len();

    items.retain(|item| window.contains(item.sent_at) && selector.matches(item));

    debug!(
        source = %source.id(),
        start = %window.start,
        end = %window.end,
        fetched,
        selected = items.len(),
        "Fetched mail window"
    );
    Ok(items)
}
