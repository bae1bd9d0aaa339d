//! Heap-backed segments.

use crate::backend::Segment;
use crate::error::{StorageError, StorageResult};

/// Smallest allocation a heap segment starts with once it is touched.
const MIN_MEMORY_SEGMENT: usize = 4096;

/// A segment stored in a heap-allocated byte vector.
///
/// This segment is suitable for:
/// - Unit tests
/// - Ephemeral stores that don't need persistence
/// - The transaction log of an in-memory store
///
/// Growth doubles the current length (rounded up to the requested length)
/// and is capped at the segment capacity.
///
/// # Example
///
/// ```rust
/// use recstore_storage::{MemorySegment, Segment};
///
/// let mut segment = MemorySegment::new(1 << 20);
/// segment.grow(10).unwrap();
/// segment.as_mut_slice()[..5].copy_from_slice(b"hello");
/// assert_eq!(&segment.as_slice()[..5], b"hello");
/// ```
#[derive(Debug)]
pub struct MemorySegment {
    data: Vec<u8>,
    capacity: usize,
}

impl MemorySegment {
    /// Creates an empty heap segment that may grow up to `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }

    /// Creates a heap segment pre-filled with `data`.
    ///
    /// Useful for testing recovery scenarios.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is longer than `capacity`.
    pub fn with_data(data: Vec<u8>, capacity: usize) -> StorageResult<Self> {
        if data.len() > capacity {
            return Err(StorageError::SegmentOverflow {
                requested: data.len(),
                capacity,
            });
        }
        Ok(Self { data, capacity })
    }

    /// Returns the fixed capacity of this segment.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Segment for MemorySegment {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn grow(&mut self, min_len: usize) -> StorageResult<()> {
        if min_len <= self.data.len() {
            return Ok(());
        }
        if min_len > self.capacity {
            return Err(StorageError::SegmentOverflow {
                requested: min_len,
                capacity: self.capacity,
            });
        }

        let doubled = self.data.len().saturating_mul(2).max(MIN_MEMORY_SEGMENT);
        let new_len = doubled.max(min_len).min(self.capacity);
        self.data.resize(new_len, 0);
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        // Nothing to flush for heap memory
        Ok(())
    }
}
