//! Store configuration.

use crate::error::{StoreError, StoreResult};
use recstore_storage::{
    SpaceOptions, DEFAULT_GROWTH_INCREMENT, DEFAULT_SEGMENT_SHIFT, MAX_SEGMENT_SHIFT,
    MIN_SEGMENT_SHIFT,
};

/// Default capacity of the write-behind ready-recid pool.
pub const DEFAULT_WRITE_BEHIND_POOL: usize = 128;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the store already exists.
    pub error_if_exists: bool,

    /// Whether commit forces the sealed log, and then the replayed index and
    /// data spaces, to stable storage.
    pub sync_on_commit: bool,

    /// Growth step of file-backed segments, in bytes.
    pub growth_increment: usize,

    /// log2 of the segment size.
    pub segment_shift: u32,

    /// Number of pre-allocated recids kept ready by the write-behind pipeline.
    pub write_behind_pool: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            growth_increment: DEFAULT_GROWTH_INCREMENT, // 1 MiB
            segment_shift: DEFAULT_SEGMENT_SHIFT,       // 1 GiB
            write_behind_pool: DEFAULT_WRITE_BEHIND_POOL,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the store exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the file growth increment.
    #[must_use]
    pub const fn growth_increment(mut self, bytes: usize) -> Self {
        self.growth_increment = bytes;
        self
    }

    /// Sets log2 of the segment size.
    #[must_use]
    pub const fn segment_shift(mut self, shift: u32) -> Self {
        self.segment_shift = shift;
        self
    }

    /// Sets the write-behind ready pool capacity.
    #[must_use]
    pub const fn write_behind_pool(mut self, capacity: usize) -> Self {
        self.write_behind_pool = capacity;
        self
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> StoreResult<()> {
        if !(MIN_SEGMENT_SHIFT..=MAX_SEGMENT_SHIFT).contains(&self.segment_shift) {
            return Err(StoreError::invalid_config(format!(
                "segment_shift must be within {MIN_SEGMENT_SHIFT}..={MAX_SEGMENT_SHIFT}, got {}",
                self.segment_shift
            )));
        }
        if self.growth_increment == 0 {
            return Err(StoreError::invalid_config("growth_increment must be non-zero"));
        }
        if self.write_behind_pool == 0 {
            return Err(StoreError::invalid_config("write_behind_pool must be non-zero"));
        }
        Ok(())
    }

    /// Returns the segment layout for the store's spaces.
    #[must_use]
    pub fn space_options(&self) -> SpaceOptions {
        SpaceOptions {
            segment_shift: self.segment_shift,
            growth_increment: self.growth_increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(config.sync_on_commit);
        assert_eq!(config.write_behind_pool, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .segment_shift(17)
            .growth_increment(4096);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.space_options().segment_shift, 17);
        assert_eq!(config.space_options().growth_increment, 4096);
    }

    #[test]
    fn out_of_range_shift_rejected() {
        let result = Config::new().segment_shift(12).validate();
        assert!(matches!(result, Err(StoreError::InvalidConfig { .. })));
    }

    #[test]
    fn zero_pool_rejected() {
        assert!(Config::new().write_behind_pool(0).validate().is_err());
    }
}
