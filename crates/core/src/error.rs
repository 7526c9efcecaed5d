//! Error types for the quote pivot system.

use crate::types::{AggregateFn, Column};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the quote pivot system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// A record could not be mapped to a group key.
    #[error("Invalid group key: {0}")]
    InvalidKey(String),

    /// Aggregate state violated one of its invariants.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Aggregate function cannot be applied to the column.
    #[error("Unsupported aggregate: {func} over {column}")]
    UnsupportedAggregate { column: Column, func: AggregateFn },

    /// The engine stopped accepting batches after a fatal error.
    #[error("Engine halted: {0}")]
    Halted(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an invalid key error.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Error::InvalidKey(msg.into())
    }

    /// Create an invariant violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }

    /// Create a halted error.
    pub fn halted(msg: impl Into<String>) -> Self {
        Error::Halted(msg.into())
    }

    /// Whether this error must stop the stream.
    ///
    /// Fatal errors are never recovered locally: the batch that raised one is
    /// discarded and the caller decides whether to resume.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidKey(_) | Error::Invariant(_))
    }
}
