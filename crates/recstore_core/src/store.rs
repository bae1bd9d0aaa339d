//! Thread-safe store handle.

use crate::config::Config;
use crate::engine::{Engine, StoreStats, VerifyReport};
use crate::error::{StoreError, StoreResult};
use crate::manager::RecordManager;
use crate::named::NamedRoots;
use crate::types::Recid;
use parking_lot::{Mutex, RwLock};
use std::path::Path;

/// A record store shared between threads.
///
/// Wraps an [`Engine`] in a reader-writer lock: reads run concurrently,
/// mutations and commits run one at a time. After [`RecordManager::close`]
/// every operation returns [`StoreError::Closed`].
///
/// All handles share one transaction, so [`RecordManager::get`] sees
/// uncommitted writes made through any handle. Use
/// [`Store::get_committed`] to read only committed state.
///
/// # Example
///
/// ```rust
/// use recstore_core::{RecordManager, Store};
///
/// let store = Store::open_in_memory()?;
/// let recid = store.put(b"hello")?;
/// store.set_named("greeting", Some(recid))?;
/// store.commit()?;
/// assert_eq!(store.get_named("greeting")?, Some(recid));
/// # Ok::<(), recstore_core::StoreError>(())
/// ```
pub struct Store {
    engine: RwLock<Option<Engine>>,
    /// Serializes read-modify-write of the named-root table.
    names: Mutex<()>,
}

impl Store {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Engine::open`].
    pub fn open(path: &Path) -> StoreResult<Self> {
        Engine::open(path).map(Self::from_engine)
    }

    /// Opens a store directory with a custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Engine::open_with_config`].
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        Engine::open_with_config(path, config).map(Self::from_engine)
    }

    /// Opens a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error only if initialization fails.
    pub fn open_in_memory() -> StoreResult<Self> {
        Engine::open_in_memory().map(Self::from_engine)
    }

    /// Opens a fresh in-memory store with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn open_in_memory_with_config(config: Config) -> StoreResult<Self> {
        Engine::open_in_memory_with_config(config).map(Self::from_engine)
    }

    /// Wraps an engine.
    #[must_use]
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
            names: Mutex::new(()),
        }
    }

    /// Takes the engine back out of the store.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store was closed.
    pub fn into_engine(self) -> StoreResult<Engine> {
        self.engine.write().take().ok_or(StoreError::Closed)
    }

    /// Checks if the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.read().is_some()
    }

    /// Runs `f` with shared access to the engine.
    fn read<T>(&self, f: impl FnOnce(&Engine) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self.engine.read();
        let engine = guard.as_ref().ok_or(StoreError::Closed)?;
        f(engine)
    }

    /// Runs `f` with exclusive access to the engine.
    fn write<T>(&self, f: impl FnOnce(&mut Engine) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.engine.write();
        let engine = guard.as_mut().ok_or(StoreError::Closed)?;
        f(engine)
    }

    /// Reads a record as of the last commit.
    ///
    /// # Errors
    ///
    /// See [`Engine::get_committed`].
    pub fn get_committed(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        self.read(|engine| engine.get_committed(recid))
    }

    /// Returns the whole named-root table.
    ///
    /// # Errors
    ///
    /// See [`Engine::named_roots`].
    pub fn named_roots(&self) -> StoreResult<NamedRoots> {
        self.read(Engine::named_roots)
    }

    /// Returns store statistics.
    ///
    /// # Errors
    ///
    /// See [`Engine::stats`].
    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.read(Engine::stats)
    }

    /// Checks the structural invariants of the store.
    ///
    /// # Errors
    ///
    /// See [`Engine::verify`].
    pub fn verify(&self) -> StoreResult<VerifyReport> {
        self.read(Engine::verify)
    }
}

impl RecordManager for Store {
    fn put(&self, data: &[u8]) -> StoreResult<Recid> {
        self.write(|engine| engine.put(data))
    }

    fn get(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        self.read(|engine| engine.get(recid))
    }

    fn update(&self, recid: Recid, data: &[u8]) -> StoreResult<()> {
        self.write(|engine| engine.update(recid, data))
    }

    fn delete(&self, recid: Recid) -> StoreResult<()> {
        self.write(|engine| engine.delete(recid))
    }

    fn get_named(&self, name: &str) -> StoreResult<Option<Recid>> {
        self.read(|engine| engine.get_named(name))
    }

    fn set_named(&self, name: &str, recid: Option<Recid>) -> StoreResult<()> {
        let _names = self.names.lock();
        self.write(|engine| engine.set_named(name, recid))
    }

    fn commit(&self) -> StoreResult<()> {
        self.write(Engine::commit)
    }

    fn rollback(&self) -> StoreResult<()> {
        self.write(Engine::rollback)
    }

    fn close(&self) -> StoreResult<()> {
        match self.engine.write().take() {
            Some(engine) => engine.close(),
            None => Ok(()),
        }
    }

    fn reserve(&self) -> StoreResult<Recid> {
        self.write(Engine::reserve)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("engine", &*self.engine.read())
            .finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn closed_store_rejects_operations() {
        let store = Store::open_in_memory().unwrap();
        let recid = store.put(b"x").unwrap();
        store.close().unwrap();

        assert!(!store.is_open());
        assert!(matches!(store.get(recid), Err(StoreError::Closed)));
        assert!(matches!(store.put(b"y"), Err(StoreError::Closed)));
        assert!(matches!(store.commit(), Err(StoreError::Closed)));
        // Closing again is harmless.
        store.close().unwrap();
    }

    #[test]
    fn huge_recids_through_store() {
        let store = Store::open_in_memory().unwrap();
        let huge = Recid(u64::MAX / 4);
        store.delete(huge).unwrap();
        assert_eq!(store.get(huge).unwrap(), None);
        assert!(matches!(
            store.update(huge, b"x"),
            Err(StoreError::RecordNotFound { .. })
        ));
        store.commit().unwrap();
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut recids = Vec::new();
                    for i in 0..50u8 {
                        let recid = store.put(&[t, i]).unwrap();
                        assert_eq!(store.get(recid).unwrap(), Some(vec![t, i]));
                        recids.push(recid);
                    }
                    recids
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        store.commit().unwrap();

        all.sort();
        all.dedup();
        assert_eq!(all.len(), 200);
        assert!(store.verify().unwrap().is_ok());
    }

    #[test]
    fn drop_releases_lock() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        {
            let store = Store::open(&path).unwrap();
            store.put(b"uncommitted").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().record_count, 0);
    }
}
