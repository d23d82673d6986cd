//! Mail sources and the fetch-and-filter step.
//!
//! A [`MailSource`] lists the messages sent inside a time range. The
//! scheduler asks each source for one [`TimeWindow`](crate::checkpoint::TimeWindow)
//! per tick and keeps only the items accepted by the source's [`Selector`].

mod fetch;
mod maildir;
mod model;

pub use fetch::{FetchError, MailSource, Selector, fetch_and_filter};
pub use maildir::MaildirSource;
pub use model::{MailItem, SourceId};
