//! Error types for the partitioned Elias-Fano engine.

use thiserror::Error;

/// Error variants for encoding, decoding and persistence operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed a precondition: not sorted, a value outside the declared
    /// universe, a packed value too wide for its field, or an invalid filter
    /// range.
    #[error("validation error: {0}")]
    Validation(String),

    /// A block or element index outside the structure's bounds.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// A selection query was performed for a rank that does not exist.
    #[error("invalid selection: rank {0} not found")]
    InvalidSelection(usize),

    /// A serialized buffer is malformed: bad magic, unsupported version,
    /// truncation, or inconsistent metadata.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An I/O error occurred during `save` or `load`.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for sequence operations.
pub type Result<T> = std::result::Result<T, Error>;
