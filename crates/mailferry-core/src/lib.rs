//! # mailferry-core
//!
//! Checkpointed ingestion of mail into a local document store.
//!
//! This crate provides:
//! - Mail sources queried by time window, with a Maildir implementation
//! - Per-source checkpoints, persisted in `SQLite`
//! - Deterministic, content-addressed document snapshots
//! - The fixed-interval scheduler that ties them together
//! - A quiescence detector used to gate startup on store activity
//! - A `SQLite` document store implementing the ingestion sink

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod checkpoint;
mod error;
pub mod readiness;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod store;

pub use checkpoint::{CheckpointBook, CheckpointRepository, DEFAULT_LOOKBACK_DAYS, TimeWindow};
pub use error::{Error, Result};
pub use readiness::{ActivityCallback, ActivityNotifier, IdleReport, QuiescenceDetector};
pub use scheduler::{
    AdvancePolicy, DEFAULT_TICK_INTERVAL, ImportStatus, Scheduler, SchedulerHandle, SourceOutcome,
    SourceStatus, TickReport,
};
pub use settings::{ConfigError, SelectorKind, Settings, SourceSettings};
pub use sink::{ImportOptions, ImportSummary, IngestionSink, SinkError, SourceLookup};
pub use snapshot::{
    Block, BodyConverter, BuildOutcome, ConversionError, Converted, DOCUMENT_NAMESPACE,
    DocumentId, DocumentSnapshot, HtmdConverter, ObjectType, SnapshotBuilder, SnapshotDetails,
};
pub use source::{
    FetchError, MailItem, MailSource, MaildirSource, Selector, SourceId, fetch_and_filter,
};
pub use store::{DocumentStore, SessionCredentials, StoredDocument};
