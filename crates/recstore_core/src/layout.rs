//! On-disk layout constants and the size-class function.
//!
//! ## Spaces
//!
//! Every space begins with an 8-byte header:
//!
//! ```text
//! | magic (4) | version (2, LE) | reserved (2) |
//! ```
//!
//! In the index space the header occupies the slot of recid 0, which is
//! therefore never assigned. In the data space it guarantees that no record
//! starts at offset 0.
//!
//! ## Reserved recids
//!
//! ```text
//! 0                      header
//! 1                      current physical size (bytes)
//! 2                      current index size (bytes)
//! 3                      free-recid stack head
//! 4 ..= 2539             one free-region stack head per size class
//! 2540                   named-root table
//! 2541 ..               user recids
//! ```
//!
//! ## Free-list stack page
//!
//! ```text
//! | previous page (8, packed pointer) | count (1) | 100 x value (8) |
//! ```

use crate::error::{StoreError, StoreResult};
use crate::types::Recid;
use recstore_storage::SegmentedSpace;

/// Magic tag of the index space.
pub const INDEX_MAGIC: [u8; 4] = *b"RIDX";

/// Magic tag of the data space.
pub const DATA_MAGIC: [u8; 4] = *b"RDAT";

/// Magic tag of the log space.
pub const LOG_MAGIC: [u8; 4] = *b"RLOG";

/// Current format version of all spaces.
pub const FORMAT_VERSION: u16 = 1;

/// Size of every space header.
pub const HEADER_SIZE: u64 = 8;

/// Header byte of the data space recording the segment shift the store was
/// created with.
pub const SEGMENT_SHIFT_OFFSET: u64 = 6;

/// Largest payload a single record can hold.
pub const MAX_RECORD_SIZE: usize = u16::MAX as usize;

/// Largest physical space addressable by a packed pointer.
pub const MAX_PHYS_SIZE: u64 = 1 << 48;

/// Index slot holding the current physical size.
pub const RECID_PHYS_SIZE: u64 = 1;

/// Index slot holding the current index size.
pub const RECID_INDEX_SIZE: u64 = 2;

/// Index slot holding the head page of the free-recid stack.
pub const RECID_FREE_RECIDS: u64 = 3;

/// First index slot of the per-size-class free-region stacks.
pub const RECID_FREE_PHYS_START: u64 = 4;

/// Sizes up to this bound get one size class each.
pub const SMALL_SIZE_LIMIT: usize = 1535;

/// Width of the coarse size classes above [`SMALL_SIZE_LIMIT`].
pub const SIZE_CLASS_GRANULARITY: usize = 64;

/// Number of size classes (slot 0 exists but is never used).
pub const SLOT_COUNT: usize = size_to_slot(MAX_RECORD_SIZE) + 1;

/// Index slot of the named-root table record.
pub const RECID_NAMED_ROOTS: u64 = RECID_FREE_PHYS_START + SLOT_COUNT as u64;

/// First recid handed to callers.
pub const FIRST_USER_RECID: u64 = RECID_NAMED_ROOTS + 1;

/// Index size of a freshly created store.
pub const INITIAL_INDEX_SIZE: u64 = FIRST_USER_RECID * 8;

/// Physical size of a freshly created store.
pub const INITIAL_PHYS_SIZE: u64 = HEADER_SIZE;

/// Values held by one free-list stack page.
pub const STACK_PAGE_CAPACITY: usize = 100;

/// Offset of the occupancy counter within a stack page.
pub const STACK_PAGE_COUNT_OFFSET: u64 = 8;

/// Offset of the first value slot within a stack page.
pub const STACK_PAGE_SLOTS_OFFSET: u64 = 9;

/// Size of a free-list stack page.
pub const STACK_PAGE_SIZE: usize = 8 + 1 + 8 * STACK_PAGE_CAPACITY;

/// Maps a region size to its size class.
///
/// One class per size below [`SMALL_SIZE_LIMIT`], then classes
/// [`SIZE_CLASS_GRANULARITY`] bytes wide up to [`MAX_RECORD_SIZE`].
#[must_use]
pub const fn size_to_slot(size: usize) -> usize {
    if size > SMALL_SIZE_LIMIT {
        SMALL_SIZE_LIMIT + (size - SMALL_SIZE_LIMIT) / SIZE_CLASS_GRANULARITY
    } else {
        size
    }
}

/// Returns the index slot heading the free-region stack of `slot`.
#[must_use]
pub const fn free_stack_recid(slot: usize) -> u64 {
    RECID_FREE_PHYS_START + slot as u64
}

/// Returns `true` if `recid` may be handed to callers.
#[must_use]
pub const fn is_user_recid(recid: Recid) -> bool {
    recid.0 >= FIRST_USER_RECID
}

/// Writes a space header at offset 0.
///
/// # Errors
///
/// Returns an error if the space cannot be grown or written.
pub fn write_header(space: &mut SegmentedSpace, magic: [u8; 4]) -> StoreResult<()> {
    space.ensure_available(HEADER_SIZE)?;
    let mut header = [0u8; HEADER_SIZE as usize];
    header[0..4].copy_from_slice(&magic);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    space.write_bytes(0, &header)?;
    Ok(())
}

/// Checks the header at offset 0.
///
/// # Errors
///
/// Returns [`StoreError::InvalidFormat`] on a magic or version mismatch.
pub fn check_header(space: &SegmentedSpace, magic: [u8; 4], what: &str) -> StoreResult<()> {
    if space.available() < HEADER_SIZE {
        return Err(StoreError::invalid_format(format!("{what} space has no header")));
    }
    let header = space.read_bytes(0, HEADER_SIZE as usize)?;
    if header[0..4] != magic {
        return Err(StoreError::invalid_format(format!(
            "{what} space has magic {:?}, expected {:?}",
            &header[0..4],
            magic
        )));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::invalid_format(format!(
            "{what} space is version {version}, expected {FORMAT_VERSION}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_range_matches_layout() {
        assert_eq!(SLOT_COUNT, 2536);
        assert_eq!(RECID_NAMED_ROOTS, 2540);
        assert_eq!(FIRST_USER_RECID, 2541);
        assert_eq!(STACK_PAGE_SIZE, 809);
    }

    #[test]
    fn small_sizes_map_one_to_one() {
        assert_eq!(size_to_slot(1), 1);
        assert_eq!(size_to_slot(809), 809);
        assert_eq!(size_to_slot(1535), 1535);
    }

    #[test]
    fn large_sizes_share_classes() {
        assert_eq!(size_to_slot(1536), 1535);
        assert_eq!(size_to_slot(1598), 1535);
        assert_eq!(size_to_slot(1599), 1536);
        assert_eq!(size_to_slot(MAX_RECORD_SIZE), SLOT_COUNT - 1);
    }

    #[test]
    fn slot_function_is_monotonic() {
        let mut last = 0;
        for size in 1..=MAX_RECORD_SIZE {
            let slot = size_to_slot(size);
            assert!(slot >= last);
            assert!(slot - last <= 1);
            last = slot;
        }
    }

    #[test]
    fn header_round_trip() {
        let mut space = SegmentedSpace::in_memory();
        write_header(&mut space, DATA_MAGIC).unwrap();
        assert!(check_header(&space, DATA_MAGIC, "data").is_ok());
        assert!(matches!(
            check_header(&space, INDEX_MAGIC, "index"),
            Err(StoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn newer_version_rejected() {
        let mut space = SegmentedSpace::in_memory();
        write_header(&mut space, LOG_MAGIC).unwrap();
        space.write_u16(4, FORMAT_VERSION + 1).unwrap();
        assert!(check_header(&space, LOG_MAGIC, "log").is_err());
    }

    #[test]
    fn user_recid_boundary() {
        assert!(!is_user_recid(Recid::new(RECID_NAMED_ROOTS)));
        assert!(is_user_recid(Recid::new(FIRST_USER_RECID)));
    }
}
