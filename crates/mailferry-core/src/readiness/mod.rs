//! Readiness gate for asynchronous startup phases.
//!
//! A subsystem that settles in the background (the document store opening
//! its schema, a sync catching up) reports every observable event through an
//! [`ActivityNotifier`]. The startup flow calls
//! [`QuiescenceDetector::wait_until_idle`] and proceeds once the subsystem has
//! been silent for the configured duration.

mod detector;

pub use detector::{ActivityCallback, ActivityNotifier, IdleReport, QuiescenceDetector};
