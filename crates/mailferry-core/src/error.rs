//! Error types for the core library.

use thiserror::Error;

use crate::settings::ConfigError;
use crate::sink::SinkError;
use crate::snapshot::ConversionError;
use crate::source::FetchError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mail source could not be read.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A message body could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The document store rejected an operation.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
