//! Conversion of mail items into store-ready document snapshots.
//!
//! A snapshot's id is derived from the mail item's source identifier alone,
//! so fetching and converting the same message again yields the same id and
//! the store treats the re-import as an update.

mod builder;
mod convert;
mod model;

pub use builder::{BuildOutcome, ConversionError, SnapshotBuilder};
pub use convert::{BodyConverter, Converted, HtmdConverter};
pub use model::{
    Block, DOCUMENT_NAMESPACE, DocumentId, DocumentSnapshot, ObjectType, SnapshotDetails,
};
