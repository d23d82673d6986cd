//! Scheduler data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::TimeWindow;
use crate::sink::ImportSummary;
use crate::source::SourceId;

/// When a successfully fetched source's checkpoint moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Right after the fetch succeeds. A failed import is not retried.
    #[default]
    OnFetch,
    /// Only once the tick's batch has been accepted by the sink. A failed
    /// import holds back every source in the batch, so the same window is
    /// fetched again next tick.
    OnImport,
}

/// What happened to one source during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// The window was fetched.
    Fetched {
        /// Items that passed the selector.
        selected: usize,
        /// Snapshots built from those items.
        built: usize,
    },
    /// The fetch failed; the checkpoint was left alone.
    Failed(String),
    /// The window was empty, usually because the clock moved backwards.
    Skipped,
}

/// Per-source entry of a [`TickReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    /// The source.
    pub source: SourceId,
    /// Window requested from the source.
    pub window: TimeWindow,
    /// Result of the fetch.
    pub status: SourceStatus,
}

/// Result of handing the batch to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportStatus {
    /// Nothing to import.
    #[default]
    Empty,
    /// The sink accepted the batch.
    Imported(ImportSummary),
    /// The sink rejected the batch.
    Failed(String),
}

/// Summary of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Wall-clock time the tick ran for.
    pub now: DateTime<Utc>,
    /// One entry per configured source, in configuration order.
    pub sources: Vec<SourceOutcome>,
    /// Snapshots sent to the sink.
    pub snapshots: usize,
    /// Items dropped because their body could not be converted.
    pub conversion_failures: usize,
    /// Outcome of the import.
    pub import: ImportStatus,
}

impl TickReport {
    /// Number of sources whose fetch failed.
    #[must_use]
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|outcome| matches!(outcome.status, SourceStatus::Failed(_)))
            .count()
    }

    /// Emits a one-line summary of the tick.
    pub fn log(&self) {
        match &self.import {
            ImportStatus::Failed(_) => warn!(
                now = %self.now,
                snapshots = self.snapshots,
                "Tick finished without importing"
            ),
            ImportStatus::Imported(summary) => info!(
                now = %self.now,
                sources = self.sources.len(),
                failed_sources = self.failed_sources(),
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Tick imported documents"
            ),
            ImportStatus::Empty if self.failed_sources() > 0 => warn!(
                now = %self.now,
                failed_sources = self.failed_sources(),
                "Tick found nothing to import"
            ),
            ImportStatus::Empty => debug!(now = %self.now, "Tick found nothing to import"),
        }
    }
}
