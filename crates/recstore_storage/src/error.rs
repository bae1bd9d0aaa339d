//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the addressable end of a space.
    #[error("read beyond end of space: offset {offset}, len {len}, available {available}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The number of addressable bytes.
        available: u64,
    },

    /// Attempted to write beyond the addressable end of a space.
    ///
    /// Writers must call `ensure_available` first.
    #[error("write beyond end of space: offset {offset}, len {len}, available {available}")]
    WritePastEnd {
        /// The requested write offset.
        offset: u64,
        /// The requested write length.
        len: usize,
        /// The number of addressable bytes.
        available: u64,
    },

    /// A segment was asked to grow past its fixed capacity.
    #[error("segment overflow: requested {requested} bytes, segment capacity is {capacity}")]
    SegmentOverflow {
        /// The requested segment length.
        requested: usize,
        /// The segment capacity.
        capacity: usize,
    },

    /// Space options are out of range.
    #[error("invalid space options: {0}")]
    InvalidOptions(String),
}
