//! Local document store.
//!
//! A `SQLite` database bound to one account. It is the concrete
//! [`IngestionSink`](crate::sink::IngestionSink) and
//! [`SourceLookup`](crate::sink::SourceLookup) used by the binary.

mod model;
mod repository;

pub use model::{SessionCredentials, StoredDocument};
pub use repository::DocumentStore;
