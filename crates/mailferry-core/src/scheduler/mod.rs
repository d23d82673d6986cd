//! Fixed-interval ingestion loop.
//!
//! Each tick walks every configured source: compute its window from the
//! checkpoint, fetch and select, build snapshots, then import everything the
//! tick produced as one batch. Ticks never overlap.

mod model;
mod runner;

pub use model::{AdvancePolicy, ImportStatus, SourceOutcome, SourceStatus, TickReport};
pub use runner::{DEFAULT_TICK_INTERVAL, Scheduler, SchedulerHandle};
