//! Property-based test generators using proptest.
//!
//! Provides strategies for generating payloads and operation sequences
//! that stay within the store's limits.

use proptest::prelude::*;
use recstore_core::layout::MAX_RECORD_SIZE;

/// Strategy for generating record payloads, biased towards small records.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        6 => prop::collection::vec(any::<u8>(), 0..256),
        3 => prop::collection::vec(any::<u8>(), 256..4096),
        1 => prop::collection::vec(any::<u8>(), 4096..=MAX_RECORD_SIZE),
    ]
}

/// Strategy for generating small record payloads.
pub fn small_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating valid named-root names.
pub fn root_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// One step of a generated workload.
///
/// Steps that target an existing record carry a `slot` that the runner maps
/// onto the recids handed out so far, so sequences stay meaningful after
/// shrinking.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Store a new record
    Put {
        /// Record payload
        data: Vec<u8>,
    },
    /// Replace a known record's payload
    Update {
        /// Index into the recids seen so far
        slot: usize,
        /// New payload
        data: Vec<u8>,
    },
    /// Delete a known record
    Delete {
        /// Index into the recids seen so far
        slot: usize,
    },
    /// Read a known record
    Get {
        /// Index into the recids seen so far
        slot: usize,
    },
    /// Commit the open transaction
    Commit,
    /// Roll back the open transaction
    Rollback,
}

/// Strategy for generating store operations.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        4 => small_payload_strategy().prop_map(|data| StoreOperation::Put { data }),
        3 => (any::<usize>(), small_payload_strategy())
            .prop_map(|(slot, data)| StoreOperation::Update { slot, data }),
        2 => any::<usize>().prop_map(|slot| StoreOperation::Delete { slot }),
        2 => any::<usize>().prop_map(|slot| StoreOperation::Get { slot }),
        1 => Just(StoreOperation::Commit),
        1 => Just(StoreOperation::Rollback),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
