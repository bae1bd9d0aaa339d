//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use recstore_core::{Config, Engine, RecordManager, Store};
use recstore_storage::MIN_SEGMENT_SHIFT;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns a configuration with the smallest allowed segment size.
///
/// Small segments make segment-boundary padding reachable with a few
/// hundred kilobytes of records.
#[must_use]
pub fn small_segment_config() -> Config {
    Config::default()
        .segment_shift(MIN_SEGMENT_SHIFT)
        .growth_increment(1 << 16)
}

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
    config: Config,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a new in-memory test store with a custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            store: Store::open_in_memory_with_config(config.clone())
                .expect("Failed to open in-memory store"),
            temp_dir: None,
            config,
        }
    }

    /// Creates a new file-backed test store.
    pub fn file() -> Self {
        Self::file_with_config(Config::default())
    }

    /// Creates a new file-backed test store with a custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open_with_config(&store_path(&temp_dir), config.clone())
            .expect("Failed to open file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
            config,
        }
    }

    /// Returns the store path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(store_path)
    }

    /// Closes and reopens a file-backed store.
    ///
    /// Uncommitted changes are discarded, as with any close.
    pub fn reopen(&mut self) {
        let path = self.path().expect("Only file stores can be reopened");
        self.store.close().expect("Failed to close store");
        self.store =
            Store::open_with_config(&path, self.config.clone()).expect("Failed to reopen store");
    }

    /// Closes the store and opens the files again as an exclusive engine.
    pub fn into_engine(self) -> (Engine, TempDir) {
        let temp_dir = self.temp_dir.expect("Only file stores can be reopened");
        self.store.close().expect("Failed to close store");
        let engine = Engine::open_with_config(&store_path(&temp_dir), self.config)
            .expect("Failed to reopen engine");
        (engine, temp_dir)
    }
}

fn store_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("store")
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use recstore_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         let recid = store.put(b"hello").unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// Runs a test with a temporary in-memory exclusive engine.
pub fn with_temp_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut Engine) -> R,
{
    let mut engine = Engine::open_in_memory().expect("Failed to open in-memory engine");
    f(&mut engine)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use recstore_core::Recid;

    /// Creates a store with `count` committed records of `size` bytes each.
    ///
    /// Record `i` is filled with the byte `i as u8`.
    pub fn populated_store(count: usize, size: usize) -> (TestStore, Vec<Recid>) {
        let test_store = TestStore::memory();
        let recids = (0..count)
            .map(|i| {
                test_store
                    .put(&vec![i as u8; size])
                    .expect("Failed to put record")
            })
            .collect();
        test_store.commit().expect("Failed to commit");
        (test_store, recids)
    }
}
