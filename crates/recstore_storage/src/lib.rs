//! # recstore Storage
//!
//! Segmented, byte-addressable spaces for recstore.
//!
//! This crate provides the lowest-level storage abstraction for recstore.
//! A space is an **opaque byte range** - it does not interpret the bytes it
//! stores.
//!
//! ## Design Principles
//!
//! - One logical space is built from fixed-capacity segments (1 GiB by default)
//! - Offset translation happens in exactly one place ([`SegmentedSpace`])
//! - No knowledge of record indexes, allocators or logs
//! - Spaces are `Send + Sync` so an engine can share them behind a lock
//!
//! ## Available Segments
//!
//! - [`MemorySegment`] - heap-backed, for tests and ephemeral stores
//! - [`MappedSegment`] - a window of a memory-mapped file
//!
//! ## Example
//!
//! ```rust
//! use recstore_storage::SegmentedSpace;
//!
//! let mut space = SegmentedSpace::in_memory();
//! space.ensure_available(16).unwrap();
//! space.write_u64(8, 42).unwrap();
//! assert_eq!(space.read_u64(8).unwrap(), 42);
//! ```

#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod space;

pub use backend::Segment;
pub use error::{StorageError, StorageResult};
pub use file::{open_space_file, MappedSegment};
pub use memory::MemorySegment;
pub use space::{
    SegmentedSpace, SpaceOptions, DEFAULT_GROWTH_INCREMENT, DEFAULT_SEGMENT_SHIFT,
    MAX_SEGMENT_SHIFT, MIN_SEGMENT_SHIFT,
};
