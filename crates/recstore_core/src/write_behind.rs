//! Write-behind pipeline.
//!
//! [`WriteBehind`] wraps a [`RecordManager`] and hands mutations to one
//! background worker, so callers return as soon as the mutation is
//! buffered. The worker also keeps a pool of reserved recids ready, so
//! `put` rarely waits for the allocator.
//!
//! ## Visibility
//!
//! A buffered mutation is visible to `get` immediately. Mutations of the
//! same recid are last-write-wins: the worker removes an applied entry only
//! if it was not replaced while being applied.
//!
//! ## Locking
//!
//! `apply` serializes everything that touches the inner manager on behalf
//! of the pipeline (worker rounds, commit, rollback, close). It is always
//! taken before `state`.

use crate::config::DEFAULT_WRITE_BEHIND_POOL;
use crate::error::{StoreError, StoreResult};
use crate::layout::{is_user_recid, MAX_RECORD_SIZE};
use crate::manager::RecordManager;
use crate::types::Recid;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum PendingOp {
    Write(Vec<u8>),
    Delete,
}

#[derive(Debug)]
struct Pending {
    seq: u64,
    op: PendingOp,
}

#[derive(Debug, Default)]
struct State {
    pending: HashMap<Recid, Pending>,
    ready: VecDeque<Recid>,
    next_seq: u64,
    shutdown: bool,
    closed: bool,
    failure: Option<String>,
}

impl State {
    fn check(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Some(reason) = &self.failure {
            return Err(StoreError::WorkerFailed {
                reason: reason.clone(),
            });
        }
        Ok(())
    }

    fn enqueue(&mut self, recid: Recid, op: PendingOp) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(recid, Pending { seq, op });
    }

    /// Removes every pending mutation in submission order.
    fn take_pending(&mut self) -> Vec<(Recid, PendingOp)> {
        let mut batch: Vec<_> = self.pending.drain().collect();
        batch.sort_by_key(|(_, pending)| pending.seq);
        batch
            .into_iter()
            .map(|(recid, pending)| (recid, pending.op))
            .collect()
    }
}

struct Shared<R> {
    inner: R,
    state: Mutex<State>,
    /// Signals the worker that there is something to do.
    work: Condvar,
    /// Signals callers that the worker finished a round.
    progress: Condvar,
    apply: Mutex<()>,
    capacity: usize,
}

impl<R: RecordManager> Shared<R> {
    fn apply_op(&self, recid: Recid, op: &PendingOp) -> StoreResult<()> {
        match op {
            PendingOp::Write(data) => self.inner.update(recid, data),
            PendingOp::Delete => self.inner.delete(recid),
        }
    }

    /// Applies a snapshot of the pending map and refills the ready pool.
    fn round(&self) -> StoreResult<()> {
        let _apply = self.apply.lock();
        let (batch, refill) = {
            let state = self.state.lock();
            let batch: Vec<(Recid, u64, PendingOp)> = state
                .pending
                .iter()
                .map(|(recid, pending)| (*recid, pending.seq, pending.op.clone()))
                .collect();
            let refill = if state.shutdown {
                0
            } else {
                self.capacity.saturating_sub(state.ready.len())
            };
            (batch, refill)
        };

        for (recid, _, op) in &batch {
            self.apply_op(*recid, op)?;
        }
        let mut fresh = Vec::with_capacity(refill);
        for _ in 0..refill {
            fresh.push(self.inner.reserve()?);
        }

        let mut state = self.state.lock();
        for (recid, seq, _) in batch {
            if state.pending.get(&recid).is_some_and(|p| p.seq == seq) {
                state.pending.remove(&recid);
            }
        }
        state.ready.extend(fresh);
        drop(state);
        self.progress.notify_all();
        Ok(())
    }

    fn fail(&self, error: &StoreError) {
        warn!(%error, "write-behind worker failed");
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(error.to_string());
        }
        drop(state);
        self.progress.notify_all();
    }
}

fn run_worker<R: RecordManager>(shared: &Shared<R>) {
    loop {
        {
            let mut state = shared.state.lock();
            loop {
                if state.failure.is_some() {
                    return;
                }
                let refill = !state.shutdown && state.ready.len() < shared.capacity;
                if !state.pending.is_empty() || refill {
                    break;
                }
                if state.shutdown {
                    return;
                }
                shared.work.wait(&mut state);
            }
        }
        if let Err(e) = shared.round() {
            shared.fail(&e);
            return;
        }
    }
}

/// Asynchronous write-behind decorator over a [`RecordManager`].
///
/// # Example
///
/// ```rust
/// use recstore_core::{RecordManager, Store, WriteBehind};
///
/// let pipeline = WriteBehind::new(Store::open_in_memory()?)?;
/// let recid = pipeline.put(b"queued")?;
/// assert_eq!(pipeline.get(recid)?, Some(b"queued".to_vec()));
/// pipeline.commit()?;
/// pipeline.close()?;
/// # Ok::<(), recstore_core::StoreError>(())
/// ```
pub struct WriteBehind<R: RecordManager + 'static> {
    shared: Arc<Shared<R>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<R: RecordManager + 'static> WriteBehind<R> {
    /// Starts a pipeline with the default ready-pool capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(inner: R) -> StoreResult<Self> {
        Self::with_capacity(inner, DEFAULT_WRITE_BEHIND_POOL)
    }

    /// Starts a pipeline keeping up to `capacity` recids ready.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero capacity, or an error if the
    /// worker thread cannot be spawned.
    pub fn with_capacity(inner: R, capacity: usize) -> StoreResult<Self> {
        if capacity == 0 {
            return Err(StoreError::invalid_config(
                "write-behind pool capacity must be non-zero",
            ));
        }
        let shared = Arc::new(Shared {
            inner,
            state: Mutex::new(State::default()),
            work: Condvar::new(),
            progress: Condvar::new(),
            apply: Mutex::new(()),
            capacity,
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("recstore-write-behind".into())
            .spawn(move || run_worker(&worker_shared))?;
        debug!(capacity, "write-behind worker started");
        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Returns the wrapped manager.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.shared.inner
    }

    /// Number of mutations not yet applied by the worker.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Number of recids currently ready for `put`.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.shared.state.lock().ready.len()
    }

    /// Blocks until the worker has applied every buffered mutation.
    ///
    /// # Errors
    ///
    /// Returns `Closed` or `WorkerFailed`.
    pub fn flush(&self) -> StoreResult<()> {
        let mut state = self.shared.state.lock();
        loop {
            state.check()?;
            if state.pending.is_empty() {
                return Ok(());
            }
            self.shared.work.notify_one();
            self.shared.progress.wait(&mut state);
        }
    }

    /// Applies `batch` directly and releases `unused` reservations.
    fn apply_now(&self, batch: Vec<(Recid, PendingOp)>, unused: Vec<Recid>) -> StoreResult<()> {
        let result = batch
            .iter()
            .try_for_each(|(recid, op)| self.shared.apply_op(*recid, op))
            .and_then(|()| unused.into_iter().try_for_each(|r| self.shared.inner.delete(r)));
        if let Err(e) = &result {
            self.shared.fail(e);
        }
        result
    }

    fn stop_worker(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.work.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("write-behind worker panicked");
            }
        }
    }
}

impl<R: RecordManager + 'static> RecordManager for WriteBehind<R> {
    fn put(&self, data: &[u8]) -> StoreResult<Recid> {
        if data.len() > MAX_RECORD_SIZE {
            return Err(StoreError::RecordTooLarge {
                size: data.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        let mut state = self.shared.state.lock();
        loop {
            state.check()?;
            if let Some(recid) = state.ready.pop_front() {
                state.enqueue(recid, PendingOp::Write(data.to_vec()));
                drop(state);
                self.shared.work.notify_one();
                return Ok(recid);
            }
            self.shared.work.notify_one();
            self.shared.progress.wait(&mut state);
        }
    }

    fn get(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        {
            let state = self.shared.state.lock();
            if state.closed {
                return Err(StoreError::Closed);
            }
            if let Some(pending) = state.pending.get(&recid) {
                return Ok(match &pending.op {
                    PendingOp::Write(data) => Some(data.clone()),
                    PendingOp::Delete => None,
                });
            }
            if state.ready.contains(&recid) {
                return Ok(None);
            }
        }
        self.shared.inner.get(recid)
    }

    fn update(&self, recid: Recid, data: &[u8]) -> StoreResult<()> {
        if data.len() > MAX_RECORD_SIZE {
            return Err(StoreError::RecordTooLarge {
                size: data.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        if !is_user_recid(recid) {
            return Err(StoreError::ReservedRecid { recid });
        }
        let mut state = self.shared.state.lock();
        state.check()?;
        match state.pending.get(&recid).map(|p| &p.op) {
            Some(PendingOp::Delete) => return Err(StoreError::RecordNotFound { recid }),
            Some(PendingOp::Write(_)) => {}
            None => {
                if state.ready.contains(&recid) || self.shared.inner.get(recid)?.is_none() {
                    return Err(StoreError::RecordNotFound { recid });
                }
            }
        }
        state.enqueue(recid, PendingOp::Write(data.to_vec()));
        drop(state);
        self.shared.work.notify_one();
        Ok(())
    }

    fn delete(&self, recid: Recid) -> StoreResult<()> {
        if !is_user_recid(recid) {
            return Err(StoreError::ReservedRecid { recid });
        }
        let mut state = self.shared.state.lock();
        state.check()?;
        match state.pending.get(&recid).map(|p| &p.op) {
            Some(PendingOp::Delete) => return Ok(()),
            Some(PendingOp::Write(_)) => {}
            None => {
                if state.ready.contains(&recid) || self.shared.inner.get(recid)?.is_none() {
                    return Ok(());
                }
            }
        }
        state.enqueue(recid, PendingOp::Delete);
        drop(state);
        self.shared.work.notify_one();
        Ok(())
    }

    fn get_named(&self, name: &str) -> StoreResult<Option<Recid>> {
        self.shared.state.lock().check()?;
        self.shared.inner.get_named(name)
    }

    fn set_named(&self, name: &str, recid: Option<Recid>) -> StoreResult<()> {
        self.shared.state.lock().check()?;
        self.shared.inner.set_named(name, recid)
    }

    /// Applies every buffered mutation, releases unused reservations and
    /// commits the inner manager.
    fn commit(&self) -> StoreResult<()> {
        let _apply = self.shared.apply.lock();
        let (batch, unused) = {
            let mut state = self.shared.state.lock();
            state.check()?;
            let batch = state.take_pending();
            let unused: Vec<Recid> = state.ready.drain(..).collect();
            (batch, unused)
        };
        debug!(applied = batch.len(), released = unused.len(), "write-behind commit");
        self.apply_now(batch, unused)?;
        self.shared.inner.commit()?;
        self.shared.work.notify_one();
        Ok(())
    }

    /// Drops buffered mutations and reservations, then rolls back the inner
    /// manager.
    fn rollback(&self) -> StoreResult<()> {
        let _apply = self.shared.apply.lock();
        {
            let mut state = self.shared.state.lock();
            state.check()?;
            state.pending.clear();
            state.ready.clear();
        }
        self.shared.inner.rollback()?;
        self.shared.work.notify_one();
        Ok(())
    }

    /// Drains the worker, releases unused reservations and closes the inner
    /// manager. Uncommitted changes are discarded by the inner close.
    fn close(&self) -> StoreResult<()> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }
        self.shared.progress.notify_all();
        self.stop_worker();

        let _apply = self.shared.apply.lock();
        let (batch, unused, failure) = {
            let mut state = self.shared.state.lock();
            let batch = state.take_pending();
            let unused: Vec<Recid> = state.ready.drain(..).collect();
            (batch, unused, state.failure.clone())
        };
        let applied = match failure {
            Some(_) => Ok(()),
            None => self.apply_now(batch, unused),
        };
        self.shared.inner.close()?;
        applied?;
        match failure {
            Some(reason) => Err(StoreError::WorkerFailed { reason }),
            None => Ok(()),
        }
    }
}

impl<R: RecordManager + 'static> Drop for WriteBehind<R> {
    /// Stops the worker after it drains; the inner manager stays open.
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl<R: RecordManager + 'static> std::fmt::Debug for WriteBehind<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WriteBehind")
            .field("pending", &state.pending.len())
            .field("ready", &state.ready.len())
            .field("capacity", &self.shared.capacity)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
