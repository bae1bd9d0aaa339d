//! Transaction log writer.

use crate::error::StoreResult;
use crate::layout::{check_header, write_header, HEADER_SIZE, LOG_MAGIC};
use crate::log::entry::LogEntry;
use crate::log::reader::LogReader;
use recstore_storage::SegmentedSpace;

/// Append-only journal of the current transaction.
///
/// Entries are written back to back after the space header. Every append
/// also writes a zero byte just past the new entry, so the log always reads
/// as `entries... 0`: a reader stops at the first zero tag and never runs
/// into stale bytes left over from an earlier, longer transaction.
pub struct TransactionLog {
    space: SegmentedSpace,
    position: u64,
}

impl TransactionLog {
    /// Opens a log in `space`, initializing it if the space is empty.
    ///
    /// The write position starts at the first entry; callers replay or
    /// discard any existing content before appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the space cannot be
    /// written.
    pub fn open(mut space: SegmentedSpace) -> StoreResult<Self> {
        if space.available() == 0 {
            write_header(&mut space, LOG_MAGIC)?;
            space.ensure_available(HEADER_SIZE + 1)?;
            space.write_u8(HEADER_SIZE, 0)?;
        } else {
            check_header(&space, LOG_MAGIC, "log")?;
        }
        Ok(Self {
            space,
            position: HEADER_SIZE,
        })
    }

    /// Appends one entry.
    ///
    /// Returns the offset where the entry was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded or the space cannot
    /// be grown or written.
    pub fn append(&mut self, entry: &LogEntry) -> StoreResult<u64> {
        let mut buf = Vec::with_capacity(entry.encoded_len() + 1);
        entry.encode_into(&mut buf)?;
        // Terminator; overwritten by the next append.
        buf.push(0);

        let offset = self.position;
        self.space.ensure_available(offset + buf.len() as u64)?;
        self.space.write_bytes(offset, &buf)?;
        self.position += buf.len() as u64 - 1;
        Ok(offset)
    }

    /// Appends the seal marker, making the log replayable.
    ///
    /// # Errors
    ///
    /// Returns an error if the space cannot be written.
    pub fn seal(&mut self) -> StoreResult<()> {
        self.append(&LogEntry::Seal)?;
        Ok(())
    }

    /// Flushes the log to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn sync(&self) -> StoreResult<()> {
        self.space.flush()?;
        Ok(())
    }

    /// Discards every entry, leaving an empty log.
    ///
    /// Only the first tag is cleared; older bytes are overwritten by the
    /// next transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the space cannot be written.
    pub fn reset(&mut self) -> StoreResult<()> {
        self.space.ensure_available(HEADER_SIZE + 1)?;
        self.space.write_u8(HEADER_SIZE, 0)?;
        self.position = HEADER_SIZE;
        Ok(())
    }

    /// Returns the offset where the next entry will be written.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns `true` if nothing has been appended since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position == HEADER_SIZE
    }

    /// Returns a reader over the entries currently in the log space.
    #[must_use]
    pub fn reader(&self) -> LogReader<'_> {
        LogReader::new(&self.space, HEADER_SIZE)
    }

    /// Returns the underlying space.
    #[must_use]
    pub fn space(&self) -> &SegmentedSpace {
        &self.space
    }
}

impl std::fmt::Debug for TransactionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLog")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_log() -> TransactionLog {
        TransactionLog::open(SegmentedSpace::in_memory()).unwrap()
    }

    fn entries(log: &TransactionLog) -> Vec<LogEntry> {
        log.reader().map(|r| r.unwrap().1).collect()
    }

    #[test]
    fn new_log_is_empty() {
        let log = create_log();
        assert!(log.is_empty());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn append_and_read_back() {
        let mut log = create_log();
        let first = log
            .append(&LogEntry::WriteIndexLong { offset: 24, value: 7 })
            .unwrap();
        log.append(&LogEntry::WritePhysByte { offset: 40, value: 1 })
            .unwrap();

        assert_eq!(first, HEADER_SIZE);
        assert_eq!(
            entries(&log),
            vec![
                LogEntry::WriteIndexLong { offset: 24, value: 7 },
                LogEntry::WritePhysByte { offset: 40, value: 1 },
            ]
        );
    }

    #[test]
    fn reset_discards_entries() {
        let mut log = create_log();
        log.append(&LogEntry::WriteIndexZero { offset: 24 }).unwrap();
        log.seal().unwrap();
        log.reset().unwrap();

        assert!(log.is_empty());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn shorter_transaction_hides_stale_tail() {
        let mut log = create_log();
        for i in 0..10 {
            log.append(&LogEntry::WritePhysLong { offset: 8 * i, value: i })
                .unwrap();
        }
        log.seal().unwrap();
        log.reset().unwrap();

        log.append(&LogEntry::WriteIndexZero { offset: 24 }).unwrap();
        let seen = entries(&log);
        assert_eq!(seen, vec![LogEntry::WriteIndexZero { offset: 24 }]);
    }

    #[test]
    fn reopen_keeps_content() {
        let mut log = create_log();
        log.append(&LogEntry::WriteIndexZero { offset: 24 }).unwrap();
        log.seal().unwrap();

        let reopened = TransactionLog::open(log.space).unwrap();
        assert_eq!(
            entries(&reopened),
            vec![LogEntry::WriteIndexZero { offset: 24 }, LogEntry::Seal]
        );
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut space = SegmentedSpace::in_memory();
        write_header(&mut space, *b"XXXX").unwrap();
        assert!(TransactionLog::open(space).is_err());
    }
}
