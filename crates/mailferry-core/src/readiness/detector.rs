//! Debounced idle detection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Plain activity hook handed to event sources that only accept closures.
pub type ActivityCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Shared record of the most recent activity signal.
#[derive(Debug, Default)]
struct Activity {
    last: Mutex<Option<Instant>>,
    signals: AtomicU64,
}

/// Cloneable handle used by event producers to report activity.
///
/// Cheap to clone and safe to call from any number of threads or tasks.
/// Calling [`notify`](Self::notify) never blocks beyond a single uncontended
/// store.
#[derive(Debug, Clone, Default)]
pub struct ActivityNotifier {
    activity: Arc<Activity>,
}

impl ActivityNotifier {
    /// Records that the observed subsystem just did something.
    pub fn notify(&self) {
        let now = Instant::now();
        let mut last = self
            .activity
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Racing producers may arrive out of order; keep the latest instant.
        if last.is_none_or(|previous| previous < now) {
            *last = Some(now);
        }
        drop(last);
        self.activity.signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Wraps this notifier in a plain callback for event sources that only
    /// accept closures.
    #[must_use]
    pub fn callback(&self) -> ActivityCallback {
        let notifier = self.clone();
        Box::new(move || notifier.notify())
    }

    /// Total number of signals received since creation.
    #[must_use]
    pub fn signals(&self) -> u64 {
        self.activity.signals.load(Ordering::Relaxed)
    }

    fn last_activity(&self) -> Option<Instant> {
        *self
            .activity
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of one arm cycle of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleReport {
    /// Activity signals observed while waiting.
    pub signals: u64,
    /// Time spent between arming and declaring idleness.
    pub waited: Duration,
}

/// Waits for an observed subsystem to stop producing activity.
///
/// Every [`ActivityNotifier::notify`] pushes the idle deadline out to
/// `now + idle_for`. A call to [`wait_until_idle`](Self::wait_until_idle) arms
/// the detector and resolves once a full `idle_for` has passed without a
/// signal. Signals received before arming do not count.
#[derive(Debug)]
pub struct QuiescenceDetector {
    idle_for: Duration,
    notifier: ActivityNotifier,
}

impl QuiescenceDetector {
    /// Creates a detector that declares idleness after `idle_for` of silence.
    #[must_use]
    pub fn new(idle_for: Duration) -> Self {
        Self {
            idle_for,
            notifier: ActivityNotifier::default(),
        }
    }

    /// Returns a handle for producers of activity signals.
    #[must_use]
    pub fn notifier(&self) -> ActivityNotifier {
        self.notifier.clone()
    }

    /// Arms the detector and waits until no activity has been reported for
    /// the idle duration.
    ///
    /// Takes `&mut self`, so only one caller can wait per cycle. The detector
    /// disarms when this returns and may be awaited again later; each call
    /// starts a fresh cycle.
    pub async fn wait_until_idle(&mut self) -> IdleReport {
        let armed_at = Instant::now();
        let signals_at_arm = self.notifier.signals();

        loop {
            let quiet_since = self
                .notifier
                .last_activity()
                .map_or(armed_at, |last| last.max(armed_at));
            let deadline = quiet_since + self.idle_for;
            if Instant::now() >= deadline {
                break;
            }
            sleep_until(deadline).await;
        }

        let report = IdleReport {
            signals: self.notifier.signals().saturating_sub(signals_at_arm),
            waited: armed_at.elapsed(),
        };
        debug!(
            signals = report.signals,
            waited_ms = u64::try_from(report.waited.as_millis()).unwrap_or(u64::MAX),
            "Observed subsystem is idle"
        );
        report
    }
}
