//! Store directory management.
//!
//! A file-backed store lives in its own directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ index.rst         # Record index space
//! ├─ data.rst          # Physical data space
//! └─ journal.rst       # Transaction log space
//! ```
//!
//! The LOCK file ensures only one handle can open the store at a time.

use crate::error::{StoreError, StoreResult};
use crate::layout::{DATA_MAGIC, HEADER_SIZE, SEGMENT_SHIFT_OFFSET};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

/// File names within the store directory.
const LOCK_FILE: &str = "LOCK";
const INDEX_FILE: &str = "index.rst";
const DATA_FILE: &str = "data.rst";
const LOG_FILE: &str = "journal.rst";

/// Manages the store directory structure and file locking.
///
/// # Thread Safety
///
/// The `StoreDir` holds an exclusive lock on the store directory. Only one
/// `StoreDir` instance can exist per directory at a time; the lock is
/// released when it is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another handle holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_operation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the record index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_FILE)
    }

    /// Returns the path to the physical data file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    /// Returns the path to the transaction log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Checks if this is a new (empty) store directory.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        let empty = |p: PathBuf| fs::metadata(p).map_or(true, |m| m.len() == 0);
        empty(self.index_path()) && empty(self.data_path())
    }

    /// Reads the segment shift recorded in the data file header.
    ///
    /// Returns `None` for a new store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the data file does not start with a data
    /// space header.
    pub fn stored_segment_shift(&self) -> StoreResult<Option<u32>> {
        if self.is_new_store() {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_SIZE as usize];
        File::open(self.data_path())?
            .read_exact(&mut header)
            .map_err(|_| StoreError::invalid_format("data file is shorter than its header"))?;
        if header[0..4] != DATA_MAGIC {
            return Err(StoreError::invalid_format("data file has a bad magic tag"));
        }
        Ok(Some(u32::from(header[SEGMENT_SHIFT_OFFSET as usize])))
    }

    /// Syncs the store directory so newly created files survive a crash.
    ///
    /// On Windows, directory fsync is not supported; NTFS journaling
    /// covers metadata durability.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    /// Syncs the store directory so newly created files survive a crash.
    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        assert!(!store_path.exists());

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert!(dir.is_new_store());
        assert_eq!(dir.index_path(), store_path.join("index.rst"));
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("nonexistent");

        let result = StoreDir::open(&store_path, false);
        assert!(result.is_err());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked_store");

        let _dir1 = StoreDir::open(&store_path, true).unwrap();

        let result = StoreDir::open(&store_path, true);
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen_store");

        {
            let _dir = StoreDir::open(&store_path, true).unwrap();
        }

        let _dir2 = StoreDir::open(&store_path, true).unwrap();
    }

    #[test]
    fn stored_segment_shift_reads_data_header() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("shifted");

        {
            let dir = StoreDir::open(&store_path, true).unwrap();
            assert_eq!(dir.stored_segment_shift().unwrap(), None);
        }

        let config = crate::Config::default().segment_shift(17);
        crate::Engine::open_with_config(&store_path, config)
            .unwrap()
            .close()
            .unwrap();

        let dir = StoreDir::open(&store_path, false).unwrap();
        assert_eq!(dir.stored_segment_shift().unwrap(), Some(17));
    }
}
