//! Per-source checkpoints and the time windows derived from them.
//!
//! Each source's checkpoint is the end of the last window it fetched
//! successfully. The next window runs from that checkpoint up to the tick
//! time, so consecutive successful ticks cover time without gaps or overlap.

mod model;
mod repository;

pub use model::{CheckpointBook, DEFAULT_LOOKBACK_DAYS, TimeWindow};
pub use repository::CheckpointRepository;
