//! Memory-mapped file segments.

use crate::backend::Segment;
use crate::error::{StorageError, StorageResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

/// Opens or creates a file for use as a mapped space.
///
/// Returns the shared handle and the current file length.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or created.
pub fn open_space_file(path: &Path) -> StorageResult<(Arc<File>, u64)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    let len = file.metadata()?.len();
    Ok((Arc::new(file), len))
}

/// A window of a memory-mapped file.
///
/// Segment `k` of a space maps file bytes `[k * capacity, k * capacity + len)`.
/// Growing extends the file (if needed) and remaps the window with the new
/// length, rounded up to the growth increment.
///
/// # Durability
///
/// Writes land in the shared mapping and reach the file through the page
/// cache. `flush()` calls `msync` so they are on disk when it returns.
#[derive(Debug)]
pub struct MappedSegment {
    file: Arc<File>,
    start: u64,
    map: Option<MmapMut>,
    capacity: usize,
    increment: usize,
}

impl MappedSegment {
    /// Creates a segment mapping `existing_len` bytes of `file` from `start`.
    ///
    /// `start` must be a multiple of the OS page size; segment capacities are
    /// powers of two no smaller than 128 KiB, so segment starts always are.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing bytes cannot be mapped.
    pub fn open(
        file: Arc<File>,
        start: u64,
        existing_len: usize,
        capacity: usize,
        increment: usize,
    ) -> StorageResult<Self> {
        let mut segment = Self {
            file,
            start,
            map: None,
            capacity,
            increment: increment.max(1),
        };
        if existing_len > 0 {
            segment.remap(existing_len.min(capacity))?;
        }
        Ok(segment)
    }

    /// Returns the file offset this segment starts at.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[allow(unsafe_code)]
    fn remap(&mut self, len: usize) -> StorageResult<()> {
        // Drop the old window before creating the new one.
        self.map = None;
        // SAFETY: the file is held open for the lifetime of the segment and is
        // only written through mappings owned by the same space, which is
        // itself exclusively owned by one engine behind a lock. Remapping
        // requires `&mut self`, so no slice into the old window can be alive.
        let map = unsafe {
            MmapOptions::new()
                .offset(self.start)
                .len(len)
                .map_mut(&*self.file)?
        };
        self.map = Some(map);
        Ok(())
    }
}

impl Segment for MappedSegment {
    fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.map.as_deref_mut().unwrap_or(&mut [])
    }

    fn grow(&mut self, min_len: usize) -> StorageResult<()> {
        if min_len <= self.len() {
            return Ok(());
        }
        if min_len > self.capacity {
            return Err(StorageError::SegmentOverflow {
                requested: min_len,
                capacity: self.capacity,
            });
        }

        let rounded = min_len.div_ceil(self.increment) * self.increment;
        let new_len = rounded.min(self.capacity);

        let required = self.start + new_len as u64;
        if self.file.metadata()?.len() < required {
            self.file.set_len(required)?;
        }
        self.remap(new_len)
    }

    fn flush(&self) -> StorageResult<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }
}
