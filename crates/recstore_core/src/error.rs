//! Error types for recstore core.

use crate::types::Recid;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in recstore core operations.
///
/// Variants fall into three groups:
///
/// - **Rejected operations** (caller errors): the store is left unchanged
///   and remains usable.
/// - **I/O failures**: a backing space could not be read, written or grown.
/// - **Invariant violations**: on-disk structures are inconsistent.
///
/// The last two are *fatal* (see [`StoreError::is_fatal`]): after one of
/// them the engine refuses further mutating operations until reopened.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage space error.
    #[error("storage error: {0}")]
    Storage(#[from] recstore_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload exceeds the 16-bit size field.
    #[error("record too large: {size} bytes exceeds maximum of {max} bytes")]
    RecordTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Maximum payload size.
        max: usize,
    },

    /// The recid was never assigned or has been deleted.
    #[error("record not found: {recid}")]
    RecordNotFound {
        /// The missing recid.
        recid: Recid,
    },

    /// The recid belongs to the range reserved for engine bookkeeping.
    #[error("recid {recid} is reserved for engine bookkeeping")]
    ReservedRecid {
        /// The reserved recid.
        recid: Recid,
    },

    /// On-disk structures are inconsistent.
    #[error("store corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Invalid store format or version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The physical space would exceed the 48-bit offset range.
    #[error("store capacity exceeded: physical size would reach {requested} bytes")]
    CapacityExceeded {
        /// Physical size the allocation would have required.
        requested: u64,
    },

    /// Store is closed.
    #[error("store is closed")]
    Closed,

    /// Store is already open in another handle or process.
    #[error("store locked: another handle has exclusive access")]
    Locked,

    /// A previous fatal error left the store unusable.
    #[error("store refuses writes after a fatal error: {reason}")]
    Poisoned {
        /// The original fatal error.
        reason: String,
    },

    /// The write-behind worker failed to apply a mutation.
    #[error("write-behind worker failed: {reason}")]
    WorkerFailed {
        /// The error reported by the worker.
        reason: String,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns `true` for I/O failures and invariant violations.
    ///
    /// These leave the in-progress transaction in an unknown state.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::Corruption { .. } | Self::CapacityExceeded { .. }
        )
    }
}
