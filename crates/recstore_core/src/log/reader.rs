//! Log iteration and replay.

use crate::error::{StoreError, StoreResult};
use crate::log::entry::{LogEntry, LogOpcode};
use recstore_storage::SegmentedSpace;

/// A streaming iterator over log entries.
///
/// Yields `(offset, entry)` pairs in log order.
///
/// # Error Handling
///
/// - A zero tag ends the log
/// - A truncated entry (body runs past the space) is treated as the log end
/// - An unknown tag returns a corruption error and stops the iterator
pub struct LogReader<'a> {
    space: &'a SegmentedSpace,
    offset: u64,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Creates a reader starting at `offset`.
    #[must_use]
    pub fn new(space: &'a SegmentedSpace, offset: u64) -> Self {
        Self {
            space,
            offset,
            finished: false,
        }
    }

    /// Reads `len` bytes at `offset`, or `None` if they run past the space.
    fn read_exact(&self, offset: u64, len: usize) -> StoreResult<Option<Vec<u8>>> {
        if offset + len as u64 > self.space.available() {
            return Ok(None);
        }
        Ok(Some(self.space.read_bytes(offset, len)?))
    }

    fn read_next(&mut self) -> StoreResult<Option<(u64, LogEntry)>> {
        let start = self.offset;
        let Some(tag) = self.read_exact(start, 1)? else {
            return Ok(None);
        };
        if tag[0] == 0 {
            return Ok(None);
        }
        let opcode = LogOpcode::from_byte(tag[0]).ok_or_else(|| {
            StoreError::corruption(format!("unknown log opcode {} at offset {start}", tag[0]))
        })?;

        let body_start = start + 1;
        let Some(body) = self.read_exact(body_start, opcode.body_size())? else {
            return Ok(None);
        };
        let tail_start = body_start + opcode.body_size() as u64;

        let mut tail_len = 0usize;
        let mut truncated = false;
        let entry = LogEntry::decode_body(opcode, &body, |len| {
            tail_len = len;
            match self.read_exact(tail_start, len)? {
                Some(bytes) => Ok(bytes),
                None => {
                    truncated = true;
                    Ok(Vec::new())
                }
            }
        })?;
        if truncated {
            return Ok(None);
        }

        self.offset = tail_start + tail_len as u64;
        Ok(Some((start, entry)))
    }
}

impl Iterator for LogReader<'_> {
    type Item = StoreResult<(u64, LogEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Result of replaying a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The log held no entries.
    Empty,
    /// The log held entries but no seal; nothing was applied.
    Discarded {
        /// Number of entries ignored.
        entries: usize,
    },
    /// A sealed transaction was applied.
    Replayed {
        /// Number of entries applied, not counting the seal.
        entries: usize,
    },
}

/// Replays a sealed log into the index and data spaces.
///
/// Entries after the first seal are ignored. Applying the same sealed log
/// again yields identical spaces, so a crash during replay is repaired by
/// replaying once more on the next open.
///
/// # Errors
///
/// Returns an error on an unknown opcode or if a space cannot be written.
pub fn replay(
    log: &SegmentedSpace,
    start: u64,
    index: &mut SegmentedSpace,
    data: &mut SegmentedSpace,
) -> StoreResult<ReplayOutcome> {
    let mut before_seal = 0usize;
    let mut sealed = false;
    for item in LogReader::new(log, start) {
        let (_, entry) = item?;
        if entry == LogEntry::Seal {
            sealed = true;
            break;
        }
        before_seal += 1;
    }

    if !sealed {
        return Ok(if before_seal == 0 {
            ReplayOutcome::Empty
        } else {
            ReplayOutcome::Discarded {
                entries: before_seal,
            }
        });
    }

    let mut applied = 0usize;
    for item in LogReader::new(log, start) {
        let (_, entry) = item?;
        match entry {
            LogEntry::Seal => break,
            LogEntry::WriteIndexLong { offset, value } => {
                index.ensure_available(offset + 8)?;
                index.write_u64(offset, value)?;
            }
            LogEntry::WriteIndexZero { offset } => {
                index.ensure_available(offset + 8)?;
                index.write_u64(offset, 0)?;
            }
            LogEntry::WritePhysLong { offset, value } => {
                data.ensure_available(offset + 8)?;
                data.write_u64(offset, value)?;
            }
            LogEntry::WritePhysByte { offset, value } => {
                data.ensure_available(offset + 1)?;
                data.write_u8(offset, value)?;
            }
            LogEntry::WritePhysArray { offset, data: bytes } => {
                data.ensure_available(offset + bytes.len() as u64)?;
                data.write_bytes(offset, &bytes)?;
            }
        }
        applied += 1;
    }

    Ok(ReplayOutcome::Replayed { entries: applied })
}
