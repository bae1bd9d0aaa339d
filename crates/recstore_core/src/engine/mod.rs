//! The storage engine.
//!
//! [`Engine`] composes the record index, the physical allocator and the
//! transaction log into one record store with a single implicit
//! transaction. Every mutation goes to the log and to an in-memory overlay;
//! [`Engine::commit`] seals the log and replays it into the primary spaces,
//! [`Engine::rollback`] drops both.
//!
//! Mutating methods take `&mut self`, so exclusive access is checked by the
//! compiler. [`crate::Store`] adds a lock for shared use across threads.

mod allocator;
mod long_stack;
mod overlay;
mod verify;

pub use verify::{StoreStats, VerifyReport};

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::layout::{
    check_header, is_user_recid, write_header, DATA_MAGIC, HEADER_SIZE, INDEX_MAGIC,
    INITIAL_INDEX_SIZE, INITIAL_PHYS_SIZE, MAX_PHYS_SIZE, MAX_RECORD_SIZE, RECID_INDEX_SIZE,
    RECID_NAMED_ROOTS, RECID_PHYS_SIZE, SEGMENT_SHIFT_OFFSET,
};
use crate::log::{replay, LogEntry, ReplayOutcome, TransactionLog};
use crate::named::{self, NamedRoots};
use crate::types::{Recid, RecordPointer};
use overlay::TxOverlay;
use recstore_storage::SegmentedSpace;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// An exclusively owned record store.
///
/// # Example
///
/// ```rust
/// use recstore_core::Engine;
///
/// let mut engine = Engine::open_in_memory()?;
/// let recid = engine.put(b"hello")?;
/// engine.commit()?;
/// assert_eq!(engine.get(recid)?, Some(b"hello".to_vec()));
/// # Ok::<(), recstore_core::StoreError>(())
/// ```
pub struct Engine {
    index: SegmentedSpace,
    data: SegmentedSpace,
    log: TransactionLog,
    tx: TxOverlay,
    config: Config,
    /// Directory lock; `None` for in-memory stores.
    dir: Option<StoreDir>,
    /// Reason of the first fatal error, if any.
    failure: Option<String>,
}

impl Engine {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another handle has the store locked (`Locked`)
    /// - The store format is incompatible (`InvalidFormat`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store directory with a custom configuration.
    ///
    /// A sealed transaction left in the log by a crash is replayed; an
    /// unsealed one is discarded.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use recstore_core::{Config, Engine};
    /// use std::path::Path;
    ///
    /// let config = Config::default()
    ///     .create_if_missing(true)
    ///     .sync_on_commit(true);
    ///
    /// let engine = Engine::open_with_config(Path::new("my_store"), config)?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory is
    /// locked, the store is missing or already exists (per the config), or
    /// the files are not valid store spaces.
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let dir = StoreDir::open(path, config.create_if_missing)?;

        let fresh = dir.is_new_store();
        if fresh && !config.create_if_missing {
            return Err(StoreError::invalid_operation(
                "store does not exist and create_if_missing is false",
            ));
        }
        if !fresh && config.error_if_exists {
            return Err(StoreError::invalid_operation(
                "store already exists and error_if_exists is true",
            ));
        }

        let options = config.space_options();
        let index = SegmentedSpace::open_file(&dir.index_path(), options)?;
        let data = SegmentedSpace::open_file(&dir.data_path(), options)?;
        let log = SegmentedSpace::open_file(&dir.log_path(), options)?;
        if fresh {
            dir.sync_directory()?;
        }

        info!(path = %path.display(), fresh, "opening store");
        Self::bootstrap(index, data, log, config, Some(dir), fresh)
    }

    /// Opens a fresh in-memory store.
    ///
    /// Data is lost when the engine is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only if initialization fails.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens a fresh in-memory store with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn open_in_memory_with_config(config: Config) -> StoreResult<Self> {
        config.validate()?;
        let options = config.space_options();
        let index = SegmentedSpace::in_memory_with(options)?;
        let data = SegmentedSpace::in_memory_with(options)?;
        let log = SegmentedSpace::in_memory_with(options)?;
        Self::bootstrap(index, data, log, config, None, true)
    }

    fn bootstrap(
        mut index: SegmentedSpace,
        mut data: SegmentedSpace,
        log_space: SegmentedSpace,
        config: Config,
        dir: Option<StoreDir>,
        fresh: bool,
    ) -> StoreResult<Self> {
        let log = if fresh {
            write_header(&mut index, INDEX_MAGIC)?;
            write_header(&mut data, DATA_MAGIC)?;
            data.write_u8(SEGMENT_SHIFT_OFFSET, config.segment_shift as u8)?;
            index.ensure_available(INITIAL_INDEX_SIZE)?;
            index.write_u64(RECID_PHYS_SIZE * 8, INITIAL_PHYS_SIZE)?;
            index.write_u64(RECID_INDEX_SIZE * 8, INITIAL_INDEX_SIZE)?;
            let log = TransactionLog::open(log_space)?;
            index.flush()?;
            data.flush()?;
            log.sync()?;
            log
        } else {
            check_header(&index, INDEX_MAGIC, "index")?;
            check_header(&data, DATA_MAGIC, "data")?;
            let shift = u32::from(data.read_u8(SEGMENT_SHIFT_OFFSET)?);
            if shift != config.segment_shift {
                return Err(StoreError::invalid_config(format!(
                    "store was created with segment_shift {shift}, configured {}",
                    config.segment_shift
                )));
            }
            let mut log = TransactionLog::open(log_space)?;
            Self::recover(&mut log, &mut index, &mut data)?;
            log
        };

        let (phys_size, index_size) = Self::committed_counters(&index)?;
        if index_size < INITIAL_INDEX_SIZE
            || index_size % 8 != 0
            || phys_size < INITIAL_PHYS_SIZE
            || phys_size > MAX_PHYS_SIZE
        {
            return Err(StoreError::corruption(format!(
                "implausible counters: index size {index_size}, physical size {phys_size}"
            )));
        }

        debug!(phys_size, index_size, "store ready");
        Ok(Self {
            index,
            data,
            log,
            tx: TxOverlay::new(phys_size, index_size),
            config,
            dir,
            failure: None,
        })
    }

    /// Replays or discards whatever the previous session left in the log.
    fn recover(
        log: &mut TransactionLog,
        index: &mut SegmentedSpace,
        data: &mut SegmentedSpace,
    ) -> StoreResult<()> {
        match replay(log.space(), HEADER_SIZE, index, data)? {
            ReplayOutcome::Empty => return Ok(()),
            ReplayOutcome::Discarded { entries } => {
                warn!(entries, "discarding unsealed transaction log");
            }
            ReplayOutcome::Replayed { entries } => {
                info!(entries, "recovered sealed transaction from log");
                index.flush()?;
                data.flush()?;
            }
        }
        log.reset()?;
        log.sync()
    }

    fn committed_counters(index: &SegmentedSpace) -> StoreResult<(u64, u64)> {
        Ok((
            index.read_u64(RECID_PHYS_SIZE * 8)?,
            index.read_u64(RECID_INDEX_SIZE * 8)?,
        ))
    }

    // ------------------------------------------------------------------
    // Record operations
    // ------------------------------------------------------------------

    /// Stores a new record and returns its recid.
    ///
    /// # Errors
    ///
    /// Returns `RecordTooLarge` if `data` exceeds 65535 bytes; nothing is
    /// written in that case.
    pub fn put(&mut self, data: &[u8]) -> StoreResult<Recid> {
        self.check_writable()?;
        check_size(data)?;
        let result = self.put_inner(data);
        self.track(result)
    }

    fn put_inner(&mut self, data: &[u8]) -> StoreResult<Recid> {
        let recid = self.allocate_recid()?;
        let ptr = self.store_payload(data)?;
        self.index_set(recid.0, ptr.pack())?;
        Ok(recid)
    }

    /// Allocates a recid holding an empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is poisoned or allocation fails.
    pub fn reserve(&mut self) -> StoreResult<Recid> {
        self.put(&[])
    }

    /// Reads a record as seen by the current transaction.
    ///
    /// Returns `None` for recids that were never assigned, were deleted, or
    /// lie in the reserved range.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the record points past the physical space.
    pub fn get(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        if !is_user_recid(recid) || !recid.within(self.tx.index_size) {
            return Ok(None);
        }
        let ptr = RecordPointer::unpack(self.index_get(recid.0)?);
        self.read_record(ptr, self.tx.phys_size)
    }

    /// Reads a record as of the last commit, ignoring the open transaction.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the record points past the physical space.
    pub fn get_committed(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        let (phys_size, index_size) = Self::committed_counters(&self.index)?;
        if !is_user_recid(recid) || !recid.within(index_size) {
            return Ok(None);
        }
        let committed = TxOverlay::new(phys_size, index_size);
        let ptr = RecordPointer::unpack(committed.read_index(&self.index, recid.0)?);
        if ptr.is_null() {
            return Ok(None);
        }
        if ptr.end() > phys_size {
            return Err(StoreError::corruption(format!(
                "{recid} points at {ptr}, past physical size {phys_size}"
            )));
        }
        let mut buf = vec![0u8; usize::from(ptr.size)];
        committed.read_data(&self.data, ptr.offset, &mut buf)?;
        Ok(Some(buf))
    }

    /// Replaces the payload of an existing record.
    ///
    /// A payload of the same size is rewritten in place. A smaller one
    /// keeps the head of the old region and frees the tail. A larger one is
    /// written to a fresh region before the old region is freed.
    ///
    /// # Errors
    ///
    /// - `RecordTooLarge` if `data` exceeds 65535 bytes
    /// - `ReservedRecid` for recids in the reserved range
    /// - `RecordNotFound` if the recid is not assigned
    pub fn update(&mut self, recid: Recid, data: &[u8]) -> StoreResult<()> {
        self.check_writable()?;
        check_size(data)?;
        if !is_user_recid(recid) {
            return Err(StoreError::ReservedRecid { recid });
        }
        let result = self
            .live_pointer(recid)
            .and_then(|old| self.replace_payload(recid, old, data));
        self.track(result)
    }

    /// Deletes a record and makes its recid reusable.
    ///
    /// Deleting an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReservedRecid` for recids in the reserved range.
    pub fn delete(&mut self, recid: Recid) -> StoreResult<()> {
        self.check_writable()?;
        if !is_user_recid(recid) {
            return Err(StoreError::ReservedRecid { recid });
        }
        if !recid.within(self.tx.index_size) {
            return Ok(());
        }
        let result = self.delete_inner(recid);
        self.track(result)
    }

    fn delete_inner(&mut self, recid: Recid) -> StoreResult<()> {
        let ptr = RecordPointer::unpack(self.index_get(recid.0)?);
        if ptr.is_null() {
            return Ok(());
        }
        if ptr.size > 0 {
            self.free_region(ptr.offset, usize::from(ptr.size))?;
        }
        self.index_set(recid.0, 0)?;
        self.release_recid(recid);
        Ok(())
    }

    /// Returns `true` if `recid` holds a record in the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn contains(&self, recid: Recid) -> StoreResult<bool> {
        if !is_user_recid(recid) || !recid.within(self.tx.index_size) {
            return Ok(false);
        }
        Ok(self.index_get(recid.0)? != 0)
    }

    // ------------------------------------------------------------------
    // Named roots
    // ------------------------------------------------------------------

    /// Returns the whole named-root table.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the stored table cannot be decoded.
    pub fn named_roots(&self) -> StoreResult<NamedRoots> {
        let ptr = RecordPointer::unpack(self.index_get(RECID_NAMED_ROOTS)?);
        match self.read_record(ptr, self.tx.phys_size)? {
            Some(bytes) => named::decode_table(&bytes),
            None => Ok(NamedRoots::new()),
        }
    }

    /// Looks up a named root.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the stored table cannot be decoded.
    pub fn get_named(&self, name: &str) -> StoreResult<Option<Recid>> {
        Ok(self.named_roots()?.get(name).copied())
    }

    /// Binds `name` to `recid`, or removes the binding when `recid` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `ReservedRecid` when binding a reserved recid, or
    /// `RecordTooLarge` if the encoded table would exceed 65535 bytes.
    pub fn set_named(&mut self, name: &str, recid: Option<Recid>) -> StoreResult<()> {
        self.check_writable()?;
        let mut table = self.named_roots()?;
        match recid {
            Some(recid) if !is_user_recid(recid) => {
                return Err(StoreError::ReservedRecid { recid });
            }
            Some(recid) => {
                table.insert(name.to_owned(), recid);
            }
            None => {
                if table.remove(name).is_none() {
                    return Ok(());
                }
            }
        }
        let bytes = named::encode_table(&table)?;
        check_size(&bytes)?;

        let result = self.write_reserved(RECID_NAMED_ROOTS, &bytes);
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Makes every change since the last commit durable and visible.
    ///
    /// Pending free-list pushes are written to their pages, the counters are
    /// logged, the log is sealed and then replayed into the primary spaces.
    /// With `sync_on_commit` the sealed log is flushed before the replay
    /// starts and the primary spaces after it ends.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` after an earlier fatal error, or an I/O error.
    pub fn commit(&mut self) -> StoreResult<()> {
        self.check_writable()?;
        if !self.tx.is_dirty() {
            return Ok(());
        }
        let result = self.commit_inner();
        self.track(result)
    }

    fn commit_inner(&mut self) -> StoreResult<()> {
        self.seal_transaction()?;
        let sync = self.config.sync_on_commit;
        if sync {
            self.log.sync()?;
        }

        let outcome = replay(self.log.space(), HEADER_SIZE, &mut self.index, &mut self.data)?;
        if sync {
            self.index.flush()?;
            self.data.flush()?;
        }
        self.log.reset()?;
        if sync {
            self.log.sync()?;
        }

        let (phys_size, index_size) = (self.tx.phys_size, self.tx.index_size);
        self.tx.clear(phys_size, index_size);
        debug!(?outcome, phys_size, index_size, "committed transaction");
        Ok(())
    }

    /// Writes pending stack pushes and counters to the log and seals it.
    fn seal_transaction(&mut self) -> StoreResult<()> {
        self.materialize_stacks()?;
        self.index_set(RECID_PHYS_SIZE, self.tx.phys_size)?;
        self.index_set(RECID_INDEX_SIZE, self.tx.index_size)?;
        self.log.seal()
    }

    /// Discards every change since the last commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the committed counters cannot be read or the log
    /// cannot be reset.
    pub fn rollback(&mut self) -> StoreResult<()> {
        let (phys_size, index_size) = Self::committed_counters(&self.index)?;
        let discarded = self.log.position() - HEADER_SIZE;
        self.tx.clear(phys_size, index_size);
        let result = self.log.reset();
        debug!(discarded_bytes = discarded, "rolled back transaction");
        self.track(result)
    }

    /// Closes the store, discarding any uncommitted transaction.
    ///
    /// The log is reset, the spaces are flushed and the directory lock is
    /// released.
    ///
    /// # Errors
    ///
    /// Returns an error if a flush fails; the lock is released regardless.
    pub fn close(mut self) -> StoreResult<()> {
        if self.tx.is_dirty() {
            debug!("discarding uncommitted transaction on close");
        }
        self.log.reset()?;
        self.log.sync()?;
        self.index.flush()?;
        self.data.flush()?;
        info!(path = ?self.path(), "store closed");
        Ok(())
    }

    /// Seals the current transaction into the log and drops the engine
    /// without replaying it, as if the process died right after sealing.
    ///
    /// The next open replays the sealed log.
    #[doc(hidden)]
    pub fn seal_and_abandon(mut self) -> StoreResult<()> {
        self.check_writable()?;
        self.seal_transaction()?;
        self.log.sync()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the store directory, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Returns `true` if there are uncommitted changes.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_dirty()
    }

    /// Returns the reason of the fatal error that poisoned the engine.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Physical size as seen by the current transaction.
    #[must_use]
    pub fn phys_size(&self) -> u64 {
        self.tx.phys_size
    }

    /// Index size as seen by the current transaction.
    #[must_use]
    pub fn index_size(&self) -> u64 {
        self.tx.index_size
    }

    /// Returns the segment size of the data space.
    #[must_use]
    pub fn segment_size(&self) -> u64 {
        self.data.segment_size()
    }

    /// Returns the pointer stored for `recid` in the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn pointer(&self, recid: Recid) -> StoreResult<RecordPointer> {
        if !recid.within(self.tx.index_size) {
            return Ok(RecordPointer::NULL);
        }
        Ok(RecordPointer::unpack(self.index_get(recid.0)?))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_writable(&self) -> StoreResult<()> {
        match &self.failure {
            Some(reason) => Err(StoreError::Poisoned {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Poisons the engine if `result` carries a fatal error.
    fn track<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() && self.failure.is_none() {
                error!(error = %e, "fatal store error; refusing further writes");
                self.failure = Some(e.to_string());
            }
        }
        result
    }

    fn live_pointer(&self, recid: Recid) -> StoreResult<RecordPointer> {
        if !recid.within(self.tx.index_size) {
            return Err(StoreError::RecordNotFound { recid });
        }
        let ptr = RecordPointer::unpack(self.index_get(recid.0)?);
        if ptr.is_null() {
            return Err(StoreError::RecordNotFound { recid });
        }
        if ptr.end() > self.tx.phys_size {
            return Err(StoreError::corruption(format!(
                "{recid} points at {ptr}, past physical size {}",
                self.tx.phys_size
            )));
        }
        Ok(ptr)
    }

    fn read_record(&self, ptr: RecordPointer, phys_size: u64) -> StoreResult<Option<Vec<u8>>> {
        if ptr.is_null() {
            return Ok(None);
        }
        if ptr.size == 0 {
            return Ok(Some(Vec::new()));
        }
        if ptr.end() > phys_size {
            return Err(StoreError::corruption(format!(
                "record at {ptr} extends past physical size {phys_size}"
            )));
        }
        let mut buf = vec![0u8; usize::from(ptr.size)];
        self.phys_read(ptr.offset, &mut buf)?;
        Ok(Some(buf))
    }

    /// Allocates a region for `data` and writes it. Empty payloads take no
    /// region.
    fn store_payload(&mut self, data: &[u8]) -> StoreResult<RecordPointer> {
        if data.is_empty() {
            return Ok(RecordPointer::EMPTY);
        }
        let offset = self.allocate(data.len())?;
        self.phys_write_bytes(offset, data)?;
        Ok(RecordPointer::new(data.len() as u16, offset))
    }

    fn replace_payload(&mut self, recid: Recid, old: RecordPointer, data: &[u8]) -> StoreResult<()> {
        let old_size = usize::from(old.size);
        let new_size = data.len();

        if new_size == old_size {
            if new_size > 0 {
                self.phys_write_bytes(old.offset, data)?;
            }
            return Ok(());
        }

        if new_size == 0 {
            self.free_region(old.offset, old_size)?;
            return self.index_set(recid.0, RecordPointer::EMPTY.pack());
        }

        if new_size < old_size {
            self.phys_write_bytes(old.offset, data)?;
            self.free_region(old.offset + new_size as u64, old_size - new_size)?;
            let ptr = RecordPointer::new(new_size as u16, old.offset);
            return self.index_set(recid.0, ptr.pack());
        }

        let ptr = self.store_payload(data)?;
        self.index_set(recid.0, ptr.pack())?;
        if old_size > 0 {
            self.free_region(old.offset, old_size)?;
        }
        Ok(())
    }

    /// Writes a reserved record, creating it if its slot is null.
    fn write_reserved(&mut self, recid: u64, data: &[u8]) -> StoreResult<()> {
        let old = RecordPointer::unpack(self.index_get(recid)?);
        if old.is_null() {
            let ptr = self.store_payload(data)?;
            self.index_set(recid, ptr.pack())
        } else {
            self.replace_payload(Recid(recid), old, data)
        }
    }

    // Transactional accessors. Every write is logged before the overlay
    // changes; every read sees the overlay first.

    fn index_get(&self, recid: u64) -> StoreResult<u64> {
        self.tx.read_index(&self.index, recid)
    }

    fn index_set(&mut self, recid: u64, value: u64) -> StoreResult<()> {
        self.log.append(&LogEntry::index(recid * 8, value))?;
        self.tx.write_index(recid, value);
        Ok(())
    }

    fn phys_read(&self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        self.tx.read_data(&self.data, offset, buf)
    }

    fn phys_read_u8(&self, offset: u64) -> StoreResult<u8> {
        let mut buf = [0u8; 1];
        self.phys_read(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn phys_read_u64(&self, offset: u64) -> StoreResult<u64> {
        let mut buf = [0u8; 8];
        self.phys_read(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn phys_write_u8(&mut self, offset: u64, value: u8) -> StoreResult<()> {
        self.log.append(&LogEntry::WritePhysByte { offset, value })?;
        self.tx.write_data(&self.data, offset, &[value])
    }

    fn phys_write_u64(&mut self, offset: u64, value: u64) -> StoreResult<()> {
        self.log.append(&LogEntry::WritePhysLong { offset, value })?;
        self.tx.write_data(&self.data, offset, &value.to_le_bytes())
    }

    fn phys_write_bytes(&mut self, offset: u64, data: &[u8]) -> StoreResult<()> {
        self.log.append(&LogEntry::WritePhysArray {
            offset,
            data: data.to_vec(),
        })?;
        self.tx.write_data(&self.data, offset, data)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path())
            .field("phys_size", &self.tx.phys_size)
            .field("index_size", &self.tx.index_size)
            .field("in_transaction", &self.tx.is_dirty())
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

fn check_size(data: &[u8]) -> StoreResult<()> {
    if data.len() > MAX_RECORD_SIZE {
        return Err(StoreError::RecordTooLarge {
            size: data.len(),
            max: MAX_RECORD_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FIRST_USER_RECID;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn engine() -> Engine {
        Engine::open_in_memory().unwrap()
    }

    #[test]
    fn first_put_gets_first_user_recid() {
        let mut engine = engine();
        let recid = engine.put(b"hello").unwrap();
        assert_eq!(recid, Recid::new(FIRST_USER_RECID));
        assert_eq!(engine.get(recid).unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn get_out_of_range_is_absent() {
        let engine = engine();
        assert_eq!(engine.get(Recid(0)).unwrap(), None);
        assert_eq!(engine.get(Recid(RECID_NAMED_ROOTS)).unwrap(), None);
        assert_eq!(engine.get(Recid(1_000_000)).unwrap(), None);
    }

    #[test]
    fn huge_recids_are_absent() {
        let mut engine = engine();
        let recid = engine.put(b"kept").unwrap();
        engine.commit().unwrap();

        for huge in [Recid(u64::MAX), Recid(u64::MAX / 4), Recid(1 << 61)] {
            assert_eq!(engine.get(huge).unwrap(), None);
            assert_eq!(engine.get_committed(huge).unwrap(), None);
            assert!(!engine.contains(huge).unwrap());
            assert!(engine.pointer(huge).unwrap().is_null());
            engine.delete(huge).unwrap();
            assert!(matches!(
                engine.update(huge, b"x"),
                Err(StoreError::RecordNotFound { .. })
            ));
        }
        assert!(engine.failure().is_none());
        assert_eq!(engine.get(recid).unwrap(), Some(b"kept".to_vec()));
    }

    #[test]
    fn oversized_put_rejected_without_effect() {
        let mut engine = engine();
        let result = engine.put(&vec![0u8; MAX_RECORD_SIZE + 1]);
        assert!(matches!(result, Err(StoreError::RecordTooLarge { .. })));
        assert!(!engine.in_transaction());
        assert!(engine.failure().is_none());
    }

    #[test]
    fn max_size_record() {
        let mut engine = engine();
        let payload: Vec<u8> = (0..MAX_RECORD_SIZE).map(|i| (i % 251) as u8).collect();
        let recid = engine.put(&payload).unwrap();
        engine.commit().unwrap();
        assert_eq!(engine.get(recid).unwrap(), Some(payload));
    }

    #[test]
    fn empty_payload() {
        let mut engine = engine();
        let recid = engine.put(&[]).unwrap();
        assert_eq!(engine.get(recid).unwrap(), Some(Vec::new()));
        assert_eq!(engine.pointer(recid).unwrap(), RecordPointer::EMPTY);
        assert_eq!(engine.phys_size(), INITIAL_PHYS_SIZE);
    }

    #[test]
    fn update_same_size_in_place() {
        let mut engine = engine();
        let recid = engine.put(b"abcd").unwrap();
        let before = engine.pointer(recid).unwrap();
        engine.update(recid, b"wxyz").unwrap();
        assert_eq!(engine.pointer(recid).unwrap(), before);
        assert_eq!(engine.get(recid).unwrap(), Some(b"wxyz".to_vec()));
    }

    #[test]
    fn update_shrink_keeps_offset() {
        let mut engine = engine();
        let recid = engine.put(b"hello").unwrap();
        let before = engine.pointer(recid).unwrap();
        engine.update(recid, b"hi").unwrap();
        let after = engine.pointer(recid).unwrap();
        assert_eq!(after.offset, before.offset);
        assert_eq!(after.size, 2);
        assert_eq!(engine.get(recid).unwrap(), Some(b"hi".to_vec()));
    }

    #[test]
    fn update_grow_moves_record() {
        let mut engine = engine();
        let recid = engine.put(b"hi").unwrap();
        engine.update(recid, b"a much longer payload").unwrap();
        assert_eq!(
            engine.get(recid).unwrap(),
            Some(b"a much longer payload".to_vec())
        );
    }

    #[test]
    fn update_missing_or_reserved() {
        let mut engine = engine();
        assert!(matches!(
            engine.update(Recid(99_999), b"x"),
            Err(StoreError::RecordNotFound { .. })
        ));
        assert!(matches!(
            engine.update(Recid(RECID_NAMED_ROOTS), b"x"),
            Err(StoreError::ReservedRecid { .. })
        ));

        let recid = engine.put(b"x").unwrap();
        engine.delete(recid).unwrap();
        assert!(matches!(
            engine.update(recid, b"y"),
            Err(StoreError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut engine = engine();
        let recid = engine.put(b"gone").unwrap();
        engine.delete(recid).unwrap();
        engine.delete(recid).unwrap();
        assert_eq!(engine.get(recid).unwrap(), None);
        assert!(!engine.contains(recid).unwrap());

        // The recid was released once, so only one put reuses it.
        let a = engine.put(b"a").unwrap();
        let b = engine.put(b"b").unwrap();
        assert_eq!(a, recid);
        assert_ne!(b, recid);
    }

    #[test]
    fn delete_reserved_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.delete(Recid(3)),
            Err(StoreError::ReservedRecid { .. })
        ));
    }

    #[test]
    fn rollback_discards_changes() {
        let mut engine = engine();
        let kept = engine.put(b"kept").unwrap();
        engine.commit().unwrap();

        let dropped = engine.put(b"dropped").unwrap();
        engine.update(kept, b"changed").unwrap();
        engine.rollback().unwrap();

        assert_eq!(engine.get(kept).unwrap(), Some(b"kept".to_vec()));
        assert_eq!(engine.get(dropped).unwrap(), None);
        assert!(!engine.in_transaction());
    }

    #[test]
    fn get_committed_ignores_open_transaction() {
        let mut engine = engine();
        let recid = engine.put(b"v1").unwrap();
        assert_eq!(engine.get_committed(recid).unwrap(), None);
        engine.commit().unwrap();

        engine.update(recid, b"v2").unwrap();
        assert_eq!(engine.get(recid).unwrap(), Some(b"v2".to_vec()));
        assert_eq!(engine.get_committed(recid).unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn named_roots() {
        let mut engine = engine();
        let recid = engine.put(b"root").unwrap();
        engine.set_named("tree", Some(recid)).unwrap();
        assert_eq!(engine.get_named("tree").unwrap(), Some(recid));
        assert_eq!(engine.get_named("other").unwrap(), None);

        engine.set_named("tree", None).unwrap();
        assert_eq!(engine.get_named("tree").unwrap(), None);

        assert!(matches!(
            engine.set_named("bad", Some(Recid(1))),
            Err(StoreError::ReservedRecid { .. })
        ));
    }

    #[test]
    fn commit_without_changes_is_noop() {
        let mut engine = engine();
        engine.commit().unwrap();
        assert_eq!(engine.phys_size(), INITIAL_PHYS_SIZE);
        assert_eq!(engine.index_size(), INITIAL_INDEX_SIZE);
    }

    #[test]
    fn reopen_after_commit() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let recid = {
            let mut engine = Engine::open(&path).unwrap();
            let recid = engine.put(b"durable").unwrap();
            engine.set_named("root", Some(recid)).unwrap();
            engine.commit().unwrap();
            engine.put(b"lost").unwrap();
            engine.close().unwrap();
            recid
        };

        let engine = Engine::open(&path).unwrap();
        assert_eq!(engine.get(recid).unwrap(), Some(b"durable".to_vec()));
        assert_eq!(engine.get_named("root").unwrap(), Some(recid));
        assert_eq!(engine.get(Recid(recid.0 + 1)).unwrap(), None);
    }

    #[test]
    fn open_honors_existence_flags() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let missing = Engine::open_with_config(&path, Config::new().create_if_missing(false));
        assert!(missing.is_err());

        Engine::open(&path).unwrap().close().unwrap();
        let exists = Engine::open_with_config(&path, Config::new().error_if_exists(true));
        assert!(matches!(exists, Err(StoreError::InvalidOperation { .. })));
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let _engine = Engine::open(&path).unwrap();
        assert!(matches!(Engine::open(&path), Err(StoreError::Locked)));
    }

    #[test]
    fn segment_shift_mismatch_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        Engine::open_with_config(&path, Config::new().segment_shift(17))
            .unwrap()
            .close()
            .unwrap();

        let result = Engine::open_with_config(&path, Config::new().segment_shift(20));
        assert!(matches!(result, Err(StoreError::InvalidConfig { .. })));
    }

    #[test]
    fn corruption_poisons_engine() {
        let mut engine = engine();
        let recid = engine.put(b"abc").unwrap();
        engine.commit().unwrap();

        let bogus = RecordPointer::new(10, 1 << 40);
        engine
            .index
            .write_u64(recid.index_offset().unwrap(), bogus.pack())
            .unwrap();

        assert!(matches!(
            engine.delete(recid),
            Err(StoreError::Corruption { .. })
        ));
        assert!(engine.failure().is_some());
        assert!(matches!(engine.put(b"x"), Err(StoreError::Poisoned { .. })));
        assert!(matches!(engine.commit(), Err(StoreError::Poisoned { .. })));

        // Rollback still runs, but the engine stays poisoned until reopened.
        engine.rollback().unwrap();
        assert!(matches!(engine.put(b"x"), Err(StoreError::Poisoned { .. })));
    }

    #[test]
    fn corrupt_pointer_on_update_poisons_engine() {
        let mut engine = engine();
        let recid = engine.put(b"abc").unwrap();
        engine.commit().unwrap();

        let bogus = RecordPointer::new(10, 1 << 40);
        engine
            .index
            .write_u64(recid.index_offset().unwrap(), bogus.pack())
            .unwrap();

        assert!(matches!(
            engine.update(recid, b"y"),
            Err(StoreError::Corruption { .. })
        ));
        assert!(engine.failure().is_some());
        assert!(matches!(
            engine.update(recid, b"z"),
            Err(StoreError::Poisoned { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn resized_records_keep_allocator_consistent(
            sizes in prop::collection::vec((0usize..4000, 0usize..4000), 1..24),
        ) {
            let mut engine = engine();
            let mut live = Vec::new();
            for (i, (first, second)) in sizes.iter().enumerate() {
                let recid = engine.put(&vec![1u8; *first]).unwrap();
                engine.update(recid, &vec![2u8; *second]).unwrap();
                if i % 3 == 2 {
                    engine.delete(recid).unwrap();
                } else {
                    live.push((recid, *second));
                }
            }
            engine.commit().unwrap();

            let report = engine.verify().unwrap();
            prop_assert!(report.is_ok(), "{:?}", report.problems);
            for (recid, size) in live {
                prop_assert_eq!(engine.get(recid).unwrap(), Some(vec![2u8; size]));
            }
        }
    }
}
