//! Checkpoint data models.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::repository::CheckpointRepository;
use crate::Result;
use crate::source::SourceId;

/// Lookback applied the first time a source is seen.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 14;

/// A half-open interval of time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window from `start` (inclusive) to `end` (exclusive).
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Returns true if `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Returns true if the window covers no time at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Width of the window (zero for empty windows).
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }
}

/// In-memory checkpoint map, optionally written through to a repository.
///
/// Owned by the scheduler loop; nothing else reads or writes it while the
/// loop is running.
pub struct CheckpointBook {
    lookback: Duration,
    entries: HashMap<SourceId, DateTime<Utc>>,
    repository: Option<CheckpointRepository>,
}

impl CheckpointBook {
    /// Creates an empty, memory-only book.
    #[must_use]
    pub fn new(lookback: Duration) -> Self {
        Self {
            lookback,
            entries: HashMap::new(),
            repository: None,
        }
    }

    /// Creates a book backed by `repository`, loading every stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored checkpoints cannot be read.
    pub async fn hydrate(lookback: Duration, repository: CheckpointRepository) -> Result<Self> {
        let entries = repository.load_all().await?;
        debug!(count = entries.len(), "Loaded stored checkpoints");
        Ok(Self {
            lookback,
            entries,
            repository: Some(repository),
        })
    }

    /// Current checkpoint for `source`, if it has been seen.
    #[must_use]
    pub fn get(&self, source: &SourceId) -> Option<DateTime<Utc>> {
        self.entries.get(source).copied()
    }

    /// Number of tracked sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no source is tracked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The window to fetch for `source` at `now`.
    ///
    /// A source seen for the first time starts tracking at `now - lookback`,
    /// clamped to the earliest representable time. If the clock went
    /// backwards past the checkpoint the window is empty.
    pub fn window(&mut self, source: &SourceId, now: DateTime<Utc>) -> TimeWindow {
        let lookback = self.lookback;
        let start = *self.entries.entry(source.clone()).or_insert_with(|| {
            now.checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        TimeWindow::new(start, now)
    }

    /// Moves the checkpoint of `source` forward to `to`.
    ///
    /// Never moves a checkpoint backwards; returns false when `to` is not
    /// ahead of the current value. The new value is persisted when a
    /// repository is attached; a persistence failure is logged and the
    /// in-memory checkpoint still advances.
    pub async fn advance(&mut self, source: &SourceId, to: DateTime<Utc>) -> bool {
        if self.entries.get(source).is_some_and(|current| *current >= to) {
            return false;
        }
        self.entries.insert(source.clone(), to);

        if let Some(repository) = &self.repository
            && let Err(e) = repository.save(source, to).await
        {
            warn!(source = %source, error = %e, "Failed to persist checkpoint");
        }
        true
    }

    /// Closes the backing repository, if any. Later advances still update
    /// memory; their writes fail and are logged.
    pub async fn close(&self) {
        if let Some(repository) = &self.repository {
            repository.close().await;
        }
    }
}

impl std::fmt::Debug for CheckpointBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointBook")
            .field("lookback", &self.lookback)
            .field("entries", &self.entries)
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}
