//! Core type definitions for recstore.

use std::fmt;

/// Logical identifier of one record.
///
/// Recids are stable for the lifetime of a record and are reused after a
/// delete. Recid 0 is never assigned, and a fixed run of low recids is
/// reserved for engine bookkeeping (see [`crate::layout`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Recid(pub u64);

impl Recid {
    /// Creates a recid from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw recid value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the byte offset of this recid's entry in the index space,
    /// or `None` if the offset does not fit in a `u64`.
    #[must_use]
    pub const fn index_offset(self) -> Option<u64> {
        self.0.checked_mul(8)
    }

    /// Returns `true` if this recid has an entry in an index of
    /// `index_size` bytes.
    #[must_use]
    pub const fn within(self, index_size: u64) -> bool {
        match self.index_offset() {
            Some(offset) => offset < index_size,
            None => false,
        }
    }
}

impl fmt::Display for Recid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recid:{}", self.0)
    }
}

/// Number of bits used for the physical offset.
pub const OFFSET_BITS: u32 = 48;

/// Mask selecting the offset bits of a packed pointer.
pub const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// A (size, offset) pair locating bytes in the physical space.
///
/// Used both for index entries and for free region descriptors. Packed into
/// 64 bits as:
///
/// ```text
/// | size (bits 63..48) | offset (bits 47..0) |
/// ```
///
/// A packed value of 0 is the null pointer. No record or free region starts
/// at physical offset 0, which holds the space header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPointer {
    /// Payload size in bytes (0..=65535).
    pub size: u16,
    /// Byte offset into the physical space (48 bits).
    pub offset: u64,
}

impl RecordPointer {
    /// The null pointer: "absent" or "unallocated".
    pub const NULL: Self = Self { size: 0, offset: 0 };

    /// Offset marking an empty payload. It lies inside the space header, so
    /// no real region can start there.
    pub const EMPTY_OFFSET: u64 = 1;

    /// Pointer of a record whose payload is empty; it owns no physical bytes.
    pub const EMPTY: Self = Self {
        size: 0,
        offset: Self::EMPTY_OFFSET,
    };

    /// Creates a pointer. `offset` must fit in 48 bits.
    #[must_use]
    pub const fn new(size: u16, offset: u64) -> Self {
        debug_assert!(offset <= OFFSET_MASK);
        Self { size, offset }
    }

    /// Packs the pointer into its 64-bit on-disk form.
    #[must_use]
    pub const fn pack(self) -> u64 {
        ((self.size as u64) << OFFSET_BITS) | (self.offset & OFFSET_MASK)
    }

    /// Unpacks a 64-bit on-disk value.
    #[must_use]
    pub const fn unpack(value: u64) -> Self {
        Self {
            size: (value >> OFFSET_BITS) as u16,
            offset: value & OFFSET_MASK,
        }
    }

    /// Returns `true` for the null pointer.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.size == 0 && self.offset == 0
    }

    /// Returns the offset one past the last byte.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.offset + self.size as u64
    }
}

impl fmt::Display for RecordPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.size, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recid_index_offset() {
        assert_eq!(Recid::new(3).index_offset(), Some(24));
        assert_eq!(Recid::new(u64::MAX).index_offset(), None);
        assert_eq!(Recid::new(1 << 61).index_offset(), None);
        assert!(Recid::new(3).within(32));
        assert!(!Recid::new(4).within(32));
        assert!(!Recid::new(u64::MAX).within(u64::MAX));
        assert_eq!(format!("{}", Recid::new(42)), "recid:42");
    }

    #[test]
    fn pointer_bit_layout() {
        let ptr = RecordPointer::new(0xABCD, 0x0000_1234_5678_9ABC);
        assert_eq!(ptr.pack(), 0xABCD_1234_5678_9ABC);
        assert_eq!(RecordPointer::unpack(0xABCD_1234_5678_9ABC), ptr);
    }

    #[test]
    fn pointer_extremes() {
        let ptr = RecordPointer::new(u16::MAX, OFFSET_MASK);
        assert_eq!(ptr.pack(), u64::MAX);
        assert_eq!(RecordPointer::unpack(u64::MAX), ptr);
    }

    #[test]
    fn null_and_empty() {
        assert_eq!(RecordPointer::NULL.pack(), 0);
        assert!(RecordPointer::unpack(0).is_null());
        assert!(!RecordPointer::EMPTY.is_null());
        assert_eq!(RecordPointer::unpack(RecordPointer::EMPTY.pack()), RecordPointer::EMPTY);
    }

    #[test]
    fn pointer_end() {
        assert_eq!(RecordPointer::new(5, 100).end(), 105);
    }

    proptest! {
        #[test]
        fn pointer_packing_is_lossless(size in any::<u16>(), offset in 0..=OFFSET_MASK) {
            let ptr = RecordPointer::new(size, offset);
            let packed = ptr.pack();
            prop_assert_eq!(packed >> OFFSET_BITS, u64::from(size));
            prop_assert_eq!(RecordPointer::unpack(packed), ptr);
        }

        #[test]
        fn recid_offset_never_wraps(id in any::<u64>()) {
            match Recid::new(id).index_offset() {
                Some(offset) => prop_assert_eq!(offset / 8, id),
                None => prop_assert!(id > u64::MAX / 8),
            }
        }
    }
}
