//! Log entry types and serialization.

use crate::error::{StoreError, StoreResult};
use crate::layout::MAX_RECORD_SIZE;

/// Type tag of a log entry.
///
/// A zero byte where a tag is expected marks the end of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogOpcode {
    /// Set an index slot to a non-zero value.
    WriteIndexLong = 1,
    /// Set an index slot to zero.
    WriteIndexZero = 2,
    /// Write a `u64` into the data space.
    WritePhysLong = 3,
    /// Write one byte into the data space.
    WritePhysByte = 4,
    /// Write a byte array into the data space.
    WritePhysArray = 5,
    /// The transaction is complete and may be replayed.
    Seal = 111,
}

impl LogOpcode {
    /// Converts a byte to an opcode.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::WriteIndexLong),
            2 => Some(Self::WriteIndexZero),
            3 => Some(Self::WritePhysLong),
            4 => Some(Self::WritePhysByte),
            5 => Some(Self::WritePhysArray),
            111 => Some(Self::Seal),
            _ => None,
        }
    }

    /// Converts the opcode to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Size of the fixed part of the entry that follows the tag.
    #[must_use]
    pub const fn body_size(self) -> usize {
        match self {
            Self::WriteIndexLong | Self::WritePhysLong => 16,
            Self::WriteIndexZero => 8,
            Self::WritePhysByte => 9,
            Self::WritePhysArray => 10,
            Self::Seal => 0,
        }
    }
}

/// One buffered mutation of the index or data space.
///
/// Every entry is an absolute "set these bytes" operation, so replaying a
/// log twice leaves the same state as replaying it once.
///
/// ## Encoding
///
/// ```text
/// WriteIndexLong  | 1   | offset (8) | value (8) |
/// WriteIndexZero  | 2   | offset (8) |
/// WritePhysLong   | 3   | offset (8) | value (8) |
/// WritePhysByte   | 4   | offset (8) | value (1) |
/// WritePhysArray  | 5   | offset (8) | len (2) | bytes (len) |
/// Seal            | 111 |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Set the index slot at byte `offset` to `value`.
    WriteIndexLong {
        /// Byte offset into the index space.
        offset: u64,
        /// New slot value (non-zero).
        value: u64,
    },

    /// Clear the index slot at byte `offset`.
    WriteIndexZero {
        /// Byte offset into the index space.
        offset: u64,
    },

    /// Write a `u64` at `offset` in the data space.
    WritePhysLong {
        /// Byte offset into the data space.
        offset: u64,
        /// Value to write.
        value: u64,
    },

    /// Write one byte at `offset` in the data space.
    WritePhysByte {
        /// Byte offset into the data space.
        offset: u64,
        /// Value to write.
        value: u8,
    },

    /// Write `data` at `offset` in the data space.
    WritePhysArray {
        /// Byte offset into the data space.
        offset: u64,
        /// Bytes to write (at most 65535).
        data: Vec<u8>,
    },

    /// End of a complete transaction.
    Seal,
}

impl LogEntry {
    /// Builds the index entry for setting a slot, choosing the zero form
    /// when `value` is 0.
    #[must_use]
    pub fn index(offset: u64, value: u64) -> Self {
        if value == 0 {
            Self::WriteIndexZero { offset }
        } else {
            Self::WriteIndexLong { offset, value }
        }
    }

    /// Returns the opcode.
    #[must_use]
    pub fn opcode(&self) -> LogOpcode {
        match self {
            Self::WriteIndexLong { .. } => LogOpcode::WriteIndexLong,
            Self::WriteIndexZero { .. } => LogOpcode::WriteIndexZero,
            Self::WritePhysLong { .. } => LogOpcode::WritePhysLong,
            Self::WritePhysByte { .. } => LogOpcode::WritePhysByte,
            Self::WritePhysArray { .. } => LogOpcode::WritePhysArray,
            Self::Seal => LogOpcode::Seal,
        }
    }

    /// Returns the number of bytes this entry occupies in the log.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let variable = match self {
            Self::WritePhysArray { data, .. } => data.len(),
            _ => 0,
        };
        1 + self.opcode().body_size() + variable
    }

    /// Appends the encoded entry to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if a `WritePhysArray` payload exceeds 65535 bytes.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        buf.push(self.opcode().as_byte());
        match self {
            Self::WriteIndexLong { offset, value } | Self::WritePhysLong { offset, value } => {
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.extend_from_slice(&value.to_le_bytes());
            }
            Self::WriteIndexZero { offset } => {
                buf.extend_from_slice(&offset.to_le_bytes());
            }
            Self::WritePhysByte { offset, value } => {
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.push(*value);
            }
            Self::WritePhysArray { offset, data } => {
                let len = u16::try_from(data.len()).map_err(|_| StoreError::RecordTooLarge {
                    size: data.len(),
                    max: MAX_RECORD_SIZE,
                })?;
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(data);
            }
            Self::Seal => {}
        }
        Ok(())
    }

    /// Decodes the body of an entry whose tag has already been read.
    ///
    /// `body` holds exactly `opcode.body_size()` bytes; `tail` returns the
    /// variable-length payload of a `WritePhysArray`.
    pub(crate) fn decode_body(
        opcode: LogOpcode,
        body: &[u8],
        tail: impl FnOnce(usize) -> StoreResult<Vec<u8>>,
    ) -> StoreResult<Self> {
        let u64_at = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&body[at..at + 8]);
            u64::from_le_bytes(bytes)
        };
        Ok(match opcode {
            LogOpcode::WriteIndexLong => Self::WriteIndexLong {
                offset: u64_at(0),
                value: u64_at(8),
            },
            LogOpcode::WriteIndexZero => Self::WriteIndexZero { offset: u64_at(0) },
            LogOpcode::WritePhysLong => Self::WritePhysLong {
                offset: u64_at(0),
                value: u64_at(8),
            },
            LogOpcode::WritePhysByte => Self::WritePhysByte {
                offset: u64_at(0),
                value: body[8],
            },
            LogOpcode::WritePhysArray => {
                let len = u16::from_le_bytes([body[8], body[9]]) as usize;
                Self::WritePhysArray {
                    offset: u64_at(0),
                    data: tail(len)?,
                }
            }
            LogOpcode::Seal => Self::Seal,
        })
    }
}
