//! The scheduler loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::model::{AdvancePolicy, ImportStatus, SourceOutcome, SourceStatus, TickReport};
use crate::checkpoint::CheckpointBook;
use crate::sink::{ImportOptions, IngestionSink};
use crate::snapshot::SnapshotBuilder;
use crate::source::{MailSource, Selector, SourceId, fetch_and_filter};

/// Default time between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the loop accepts.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

struct ScheduledSource {
    source: Box<dyn MailSource>,
    selector: Selector,
}

/// Drives fetch, build and import for every configured source.
pub struct Scheduler {
    sources: Vec<ScheduledSource>,
    builder: SnapshotBuilder,
    sink: Arc<dyn IngestionSink>,
    checkpoints: CheckpointBook,
    interval: Duration,
    policy: AdvancePolicy,
    import_options: ImportOptions,
    ticks: u64,
}

impl Scheduler {
    /// Creates a scheduler with no sources that imports into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn IngestionSink>, checkpoints: CheckpointBook) -> Self {
        Self {
            sources: Vec::new(),
            builder: SnapshotBuilder::default(),
            sink,
            checkpoints,
            interval: DEFAULT_TICK_INTERVAL,
            policy: AdvancePolicy::default(),
            import_options: ImportOptions::default(),
            ticks: 0,
        }
    }

    /// Sets the time between ticks.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Sets when checkpoints advance.
    #[must_use]
    pub const fn with_policy(mut self, policy: AdvancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a source whose items are kept when `selector` matches.
    pub fn add_source(&mut self, source: impl MailSource + 'static, selector: Selector) {
        debug!(source = %source.id(), ?selector, "Registered mail source");
        self.sources.push(ScheduledSource {
            source: Box::new(source),
            selector,
        });
    }

    /// Current checkpoint state.
    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointBook {
        &self.checkpoints
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick for `now`.
    ///
    /// Failures never escape: a source that cannot be fetched keeps its
    /// checkpoint and is retried next tick, and a failed import is logged.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        self.ticks += 1;
        let mut outcomes = Vec::with_capacity(self.sources.len());
        let mut batch = Vec::new();
        let mut pending: Vec<SourceId> = Vec::new();
        let mut conversion_failures = 0;

        for scheduled in &self.sources {
            let id = scheduled.source.id().clone();
            let window = self.checkpoints.window(&id, now);

            if window.is_empty() {
                if window.start > now {
                    warn!(
                        source = %id,
                        checkpoint = %window.start,
                        now = %now,
                        "Clock is behind checkpoint, skipping source"
                    );
                } else {
                    debug!(source = %id, now = %now, "Window is empty, skipping source");
                }
                outcomes.push(SourceOutcome {
                    source: id,
                    window,
                    status: SourceStatus::Skipped,
                });
                continue;
            }

            let fetched =
                fetch_and_filter(scheduled.source.as_ref(), window, &scheduled.selector).await;
            let items = match fetched {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        source = %id,
                        start = %window.start,
                        end = %window.end,
                        error = %e,
                        "Fetch failed, will retry next tick"
                    );
                    outcomes.push(SourceOutcome {
                        source: id,
                        window,
                        status: SourceStatus::Failed(e.to_string()),
                    });
                    continue;
                }
            };

            let built = self.builder.build_all(&items);
            conversion_failures += built.failed;
            outcomes.push(SourceOutcome {
                source: id.clone(),
                window,
                status: SourceStatus::Fetched {
                    selected: items.len(),
                    built: built.snapshots.len(),
                },
            });
            batch.extend(built.snapshots);

            match self.policy {
                AdvancePolicy::OnFetch => {
                    self.checkpoints.advance(&id, window.end).await;
                }
                AdvancePolicy::OnImport => pending.push(id),
            }
        }

        let snapshots = batch.len();
        let import = if batch.is_empty() {
            ImportStatus::Empty
        } else {
            match self.sink.import(batch, self.import_options).await {
                Ok(summary) => ImportStatus::Imported(summary),
                Err(e) => {
                    error!(snapshots, error = %e, "Import failed");
                    ImportStatus::Failed(e.to_string())
                }
            }
        };

        if matches!(import, ImportStatus::Failed(_)) {
            if !pending.is_empty() {
                info!(
                    sources = pending.len(),
                    "Holding checkpoints until the batch is imported"
                );
            }
        } else {
            for id in &pending {
                self.checkpoints.advance(id, now).await;
            }
        }

        TickReport {
            now,
            sources: outcomes,
            snapshots,
            conversion_failures,
            import,
        }
    }

    /// Starts the loop on a background task.
    ///
    /// The first tick runs one interval from now. A tick that overruns
    /// delays the following ones instead of bunching them up.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stop_rx));
        SchedulerHandle { stop, task }
    }

    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> Self {
        let period = self.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sources = self.sources.len(),
            interval_secs = period.as_secs_f64(),
            policy = ?self.policy,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    report.log();
                }
            }
        }

        info!(ticks = self.ticks, "Scheduler stopped");
        self
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("sources", &self.sources.len())
            .field("interval", &self.interval)
            .field("policy", &self.policy)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<Scheduler>,
}

impl SchedulerHandle {
    /// Signals the loop to stop and waits for it to exit.
    ///
    /// A tick already in progress runs to completion first. Returns the
    /// scheduler so its checkpoints can be inspected.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop task panicked.
    pub async fn stop(self) -> Result<Scheduler, JoinError> {
        // The loop may already be gone if it panicked; the join reports that.
        let _ = self.stop.send(());
        self.task.await
    }
}
