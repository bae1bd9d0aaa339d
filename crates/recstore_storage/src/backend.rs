//! Segment trait definition.

use crate::error::StorageResult;

/// One fixed-capacity chunk of a [`super::SegmentedSpace`].
///
/// A segment is an **opaque, growable byte buffer**. It knows nothing about
/// headers, records or logs; it only exposes the bytes it currently maps and
/// a way to make more of them addressable, up to a fixed capacity.
///
/// # Invariants
///
/// - `len()` never decreases
/// - `len()` never exceeds the capacity the segment was created with
/// - bytes made addressable by `grow` read as zero until written
/// - segments must be `Send + Sync` so a space can be shared behind a lock
///
/// # Implementors
///
/// - [`super::MemorySegment`] - heap-backed, doubles on growth
/// - [`super::MappedSegment`] - a window of a memory-mapped file
pub trait Segment: Send + Sync {
    /// Returns the number of addressable bytes.
    fn len(&self) -> usize;

    /// Returns `true` if no bytes are addressable yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the addressable bytes.
    fn as_slice(&self) -> &[u8];

    /// Returns the addressable bytes for writing.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Grows the segment so at least `min_len` bytes are addressable.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_len` exceeds the segment capacity or the
    /// underlying file cannot be extended or remapped.
    fn grow(&mut self, min_len: usize) -> StorageResult<()>;

    /// Flushes written bytes to durable storage.
    ///
    /// Heap segments have nothing to flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> StorageResult<()>;
}
