//! Segmented address space.
//!
//! A [`SegmentedSpace`] presents one logical, growable byte space addressable
//! by a 64-bit offset, chained together from fixed-capacity segments. Every
//! offset is translated in exactly one place:
//!
//! ```text
//! segment = offset >> shift
//! local   = offset & (segment_size - 1)
//! ```
//!
//! Multi-byte reads and writes may cross a segment boundary; they are split
//! transparently. Integers are stored little-endian.

use crate::backend::Segment;
use crate::error::{StorageError, StorageResult};
use crate::file::{open_space_file, MappedSegment};
use crate::memory::MemorySegment;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default log2 of the segment size (1 GiB segments).
pub const DEFAULT_SEGMENT_SHIFT: u32 = 30;

/// Smallest accepted segment shift (128 KiB segments).
pub const MIN_SEGMENT_SHIFT: u32 = 17;

/// Largest accepted segment shift.
pub const MAX_SEGMENT_SHIFT: u32 = 30;

/// Default growth step of file-backed segments.
pub const DEFAULT_GROWTH_INCREMENT: usize = 1 << 20;

/// Shape of a segmented space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceOptions {
    /// log2 of the segment size.
    pub segment_shift: u32,
    /// Growth step of file-backed segments, in bytes.
    pub growth_increment: usize,
}

impl Default for SpaceOptions {
    fn default() -> Self {
        Self {
            segment_shift: DEFAULT_SEGMENT_SHIFT,
            growth_increment: DEFAULT_GROWTH_INCREMENT,
        }
    }
}

impl SpaceOptions {
    /// Checks that the options describe a usable space.
    ///
    /// # Errors
    ///
    /// Returns an error if the shift is out of range or the increment is zero.
    pub fn validate(&self) -> StorageResult<()> {
        if !(MIN_SEGMENT_SHIFT..=MAX_SEGMENT_SHIFT).contains(&self.segment_shift) {
            return Err(StorageError::InvalidOptions(format!(
                "segment shift {} outside {MIN_SEGMENT_SHIFT}..={MAX_SEGMENT_SHIFT}",
                self.segment_shift
            )));
        }
        if self.growth_increment == 0 {
            return Err(StorageError::InvalidOptions(
                "growth increment must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

enum Backing {
    Memory,
    File {
        path: PathBuf,
        file: Arc<File>,
    },
}

/// One unbounded byte space built from fixed-capacity segments.
///
/// Bytes in `[0, available())` are addressable. Reads and writes outside
/// that range fail; writers grow the space first with
/// [`SegmentedSpace::ensure_available`].
pub struct SegmentedSpace {
    backing: Backing,
    segments: Vec<Box<dyn Segment>>,
    options: SpaceOptions,
}

impl SegmentedSpace {
    /// Creates an empty heap-backed space with default options.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory,
            segments: Vec::new(),
            options: SpaceOptions::default(),
        }
    }

    /// Creates an empty heap-backed space.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn in_memory_with(options: SpaceOptions) -> StorageResult<Self> {
        options.validate()?;
        Ok(Self {
            backing: Backing::Memory,
            segments: Vec::new(),
            options,
        })
    }

    /// Opens or creates a file-backed space at `path`.
    ///
    /// Existing file contents are mapped segment by segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the file cannot be
    /// opened or mapped.
    pub fn open_file(path: &Path, options: SpaceOptions) -> StorageResult<Self> {
        options.validate()?;
        let (file, len) = open_space_file(path)?;

        let segment_size = 1u64 << options.segment_shift;
        let mut segments: Vec<Box<dyn Segment>> = Vec::new();
        let mut start = 0u64;
        while start < len {
            let existing = (len - start).min(segment_size) as usize;
            segments.push(Box::new(MappedSegment::open(
                Arc::clone(&file),
                start,
                existing,
                segment_size as usize,
                options.growth_increment,
            )?));
            start += segment_size;
        }

        tracing::debug!(path = %path.display(), len, segments = segments.len(), "opened mapped space");

        Ok(Self {
            backing: Backing::File {
                path: path.to_path_buf(),
                file,
            },
            segments,
            options,
        })
    }

    /// Returns the segment size in bytes.
    #[must_use]
    pub fn segment_size(&self) -> u64 {
        1u64 << self.options.segment_shift
    }

    /// Returns the options this space was created with.
    #[must_use]
    pub fn options(&self) -> SpaceOptions {
        self.options
    }

    /// Returns the number of segments currently allocated.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the path of the backing file, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory => None,
            Backing::File { path, .. } => Some(path),
        }
    }

    /// Returns the number of addressable bytes (the high watermark).
    #[must_use]
    pub fn available(&self) -> u64 {
        match self.segments.last() {
            None => 0,
            Some(last) => {
                (self.segments.len() as u64 - 1) * self.segment_size() + last.len() as u64
            }
        }
    }

    #[inline]
    fn locate(&self, offset: u64) -> (usize, usize) {
        let segment = (offset >> self.options.segment_shift) as usize;
        let local = (offset & (self.segment_size() - 1)) as usize;
        (segment, local)
    }

    fn new_segment(&self, index: usize) -> StorageResult<Box<dyn Segment>> {
        let capacity = self.segment_size() as usize;
        Ok(match &self.backing {
            Backing::Memory => Box::new(MemorySegment::new(capacity)),
            Backing::File { file, .. } => Box::new(MappedSegment::open(
                Arc::clone(file),
                index as u64 * self.segment_size(),
                0,
                capacity,
                self.options.growth_increment,
            )?),
        })
    }

    /// Grows the space so every byte below `end` is addressable.
    ///
    /// Segments before the one containing `end - 1` are grown to full
    /// capacity, keeping the addressable range contiguous.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be allocated, extended or mapped.
    pub fn ensure_available(&mut self, end: u64) -> StorageResult<()> {
        if end <= self.available() {
            return Ok(());
        }

        let (last, last_local) = self.locate(end - 1);
        let full = self.segment_size() as usize;
        for index in 0..=last {
            if index == self.segments.len() {
                let segment = self.new_segment(index)?;
                self.segments.push(segment);
            }
            let target = if index < last { full } else { last_local + 1 };
            let segment = &mut self.segments[index];
            if segment.len() < target {
                segment.grow(target)?;
            }
        }
        Ok(())
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the range is not addressable.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let available = self.available();
        if offset.saturating_add(buf.len() as u64) > available {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                available,
            });
        }

        let mut done = 0;
        while done < buf.len() {
            let (index, local) = self.locate(offset + done as u64);
            let source = self.segments[index].as_slice();
            let n = (buf.len() - done).min(source.len() - local);
            buf[done..done + n].copy_from_slice(&source[local..local + n]);
            done += n;
        }
        Ok(())
    }

    /// Writes `data` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WritePastEnd`] if the range is not addressable.
    pub fn write_from(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let available = self.available();
        if offset.saturating_add(data.len() as u64) > available {
            return Err(StorageError::WritePastEnd {
                offset,
                len: data.len(),
                available,
            });
        }

        let mut done = 0;
        while done < data.len() {
            let (index, local) = self.locate(offset + done as u64);
            let target = self.segments[index].as_mut_slice();
            let n = (data.len() - done).min(target.len() - local);
            target[local..local + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn read_bytes(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Writes `data` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn write_bytes(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.write_from(offset, data)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is not addressable.
    pub fn read_u8(&self, offset: u64) -> StorageResult<u8> {
        let mut buf = [0u8; 1];
        self.read_into(offset, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn read_u16(&self, offset: u64) -> StorageResult<u16> {
        let mut buf = [0u8; 2];
        self.read_into(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn read_u64(&self, offset: u64) -> StorageResult<u64> {
        let mut buf = [0u8; 8];
        self.read_into(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is not addressable.
    pub fn write_u8(&mut self, offset: u64, value: u8) -> StorageResult<()> {
        self.write_from(offset, &[value])
    }

    /// Writes a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn write_u16(&mut self, offset: u64, value: u16) -> StorageResult<()> {
        self.write_from(offset, &value.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not addressable.
    pub fn write_u64(&mut self, offset: u64, value: u64) -> StorageResult<()> {
        self.write_from(offset, &value.to_le_bytes())
    }

    /// Flushes every segment to durable storage.
    ///
    /// For file-backed spaces this also syncs file metadata (its length).
    ///
    /// # Errors
    ///
    /// Returns an error if any flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        for segment in &self.segments {
            segment.flush()?;
        }
        if let Backing::File { file, .. } = &self.backing {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SegmentedSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedSpace")
            .field("path", &self.path())
            .field("segments", &self.segments.len())
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}
