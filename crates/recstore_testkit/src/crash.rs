//! Crash recovery testing for recstore.
//!
//! Simulates a process dying at the two points that matter to the
//! transaction log and checks what a reopened store sees.
//!
//! ## Crash Points
//!
//! 1. **Before seal** - log entries were written but the seal was not; the
//!    whole transaction must vanish on reopen
//! 2. **After seal** - the seal reached the log but replay never ran; the
//!    whole transaction must appear on reopen
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recstore_testkit::crash::{CrashHarness, CrashPoint};
//!
//! let harness = CrashHarness::new();
//! let recid = harness.crash_with(CrashPoint::AfterSeal, |engine| {
//!     engine.put(b"survives").unwrap()
//! });
//! assert!(harness.open().get(recid).unwrap().is_some());
//! ```

use recstore_core::layout::{check_header, HEADER_SIZE, LOG_MAGIC};
use recstore_core::log::{LogEntry, LogReader};
use recstore_core::{Config, Engine, StoreDir};
use std::path::PathBuf;
use tempfile::TempDir;

/// Points at which a crash can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// Crash after logging mutations but before the seal.
    BeforeSeal,
    /// Crash after the seal but before replay into the primary spaces.
    AfterSeal,
}

/// Abandons an engine as if the process died before sealing.
///
/// The log keeps the unsealed entries; nothing reaches the primary spaces.
pub fn abandon_before_seal(engine: Engine) {
    drop(engine);
}

/// Abandons an engine as if the process died right after sealing.
pub fn abandon_after_seal(engine: Engine) {
    engine
        .seal_and_abandon()
        .expect("Failed to seal transaction");
}

/// Test harness owning a store directory that survives simulated crashes.
pub struct CrashHarness {
    temp_dir: TempDir,
    config: Config,
}

impl CrashHarness {
    /// Creates a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            config,
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Opens the store, running recovery.
    pub fn open(&self) -> Engine {
        Engine::open_with_config(&self.path(), self.config.clone()).expect("Failed to open store")
    }

    /// Opens the store, runs `f` and then crashes at `point`.
    pub fn crash_with<T>(&self, point: CrashPoint, f: impl FnOnce(&mut Engine) -> T) -> T {
        let mut engine = self.open();
        let value = f(&mut engine);
        match point {
            CrashPoint::BeforeSeal => abandon_before_seal(engine),
            CrashPoint::AfterSeal => abandon_after_seal(engine),
        }
        value
    }

    /// Opens the store, runs `f`, commits and closes cleanly.
    pub fn commit_with<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let mut engine = self.open();
        let value = f(&mut engine);
        engine.commit().expect("Failed to commit");
        engine.close().expect("Failed to close");
        value
    }

    /// Reads the log entries on disk without running recovery.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        let dir = StoreDir::open(&self.path(), false).expect("Failed to lock store");
        let space = recstore_storage::SegmentedSpace::open_file(
            &dir.log_path(),
            self.config.space_options(),
        )
        .expect("Failed to open log");
        check_header(&space, LOG_MAGIC, "log").expect("Log header is invalid");
        LogReader::new(&space, HEADER_SIZE)
            .map(|item| item.expect("Log entry is corrupt").1)
            .collect()
    }
}

impl Default for CrashHarness {
    fn default() -> Self {
        Self::new()
    }
}
