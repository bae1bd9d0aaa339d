//! Physical space and recid allocation.

use super::Engine;
use crate::error::{StoreError, StoreResult};
use crate::layout::{
    free_stack_recid, size_to_slot, MAX_PHYS_SIZE, MAX_RECORD_SIZE, RECID_FREE_RECIDS, SLOT_COUNT,
};
use crate::types::{Recid, RecordPointer};

impl Engine {
    /// Allocates `size` bytes of physical space and returns the offset.
    ///
    /// Free regions are taken first-fit by size class, starting at the
    /// smallest class whose regions are all large enough. A larger region
    /// is split and its remainder freed. With no free region left the space
    /// is extended.
    pub(super) fn allocate(&mut self, size: usize) -> StoreResult<u64> {
        debug_assert!(size > 0 && size <= MAX_RECORD_SIZE);

        let mut slot = size_to_slot(size);
        // Coarse classes hold a range of sizes; skip to one whose smallest
        // member still fits.
        if size > 1 && size_to_slot(size - 1) == slot {
            slot += 1;
        }

        for slot in slot..SLOT_COUNT {
            let Some(value) = self.stack_pop(free_stack_recid(slot))? else {
                continue;
            };
            let region = RecordPointer::unpack(value);
            let found = usize::from(region.size);
            if found < size || region.offset == 0 {
                return Err(StoreError::corruption(format!(
                    "free region {region} in size class {slot} cannot hold {size} bytes"
                )));
            }
            if found > size {
                self.free_region(region.offset + size as u64, found - size)?;
            }
            return Ok(region.offset);
        }

        self.allocate_at_end(size)
    }

    /// Extends the physical space by `size` bytes.
    ///
    /// A region never straddles a segment boundary: if it would, the rest of
    /// the current segment is freed as padding and the region starts at the
    /// next segment.
    pub(super) fn allocate_at_end(&mut self, size: usize) -> StoreResult<u64> {
        let segment = self.data.segment_size();
        let mut offset = self.tx.phys_size;
        let segment_end = (offset / segment + 1) * segment;
        let padding = if offset + size as u64 > segment_end {
            let start = offset;
            offset = segment_end;
            Some(start)
        } else {
            None
        };

        let end = offset + size as u64;
        if end > MAX_PHYS_SIZE {
            return Err(StoreError::CapacityExceeded { requested: end });
        }
        self.tx.phys_size = end;
        self.tx.mark_dirty();

        if let Some(mut start) = padding {
            while start < segment_end {
                let chunk = (segment_end - start).min(MAX_RECORD_SIZE as u64);
                self.free_region(start, chunk as usize)?;
                start += chunk;
            }
        }
        Ok(offset)
    }

    /// Returns a region to the free list of its size class.
    pub(super) fn free_region(&mut self, offset: u64, size: usize) -> StoreResult<()> {
        if offset == 0 || size == 0 || size > MAX_RECORD_SIZE {
            return Err(StoreError::corruption(format!(
                "attempt to free invalid region {size}@{offset}"
            )));
        }
        if offset + size as u64 > self.tx.phys_size {
            return Err(StoreError::corruption(format!(
                "attempt to free {size}@{offset} past physical size {}",
                self.tx.phys_size
            )));
        }
        let region = RecordPointer::new(size as u16, offset);
        self.stack_push(free_stack_recid(size_to_slot(size)), region.pack());
        Ok(())
    }

    /// Takes a recid from the free-recid stack, or extends the index.
    pub(super) fn allocate_recid(&mut self) -> StoreResult<Recid> {
        if let Some(recid) = self.stack_pop(RECID_FREE_RECIDS)? {
            return Ok(Recid(recid));
        }
        let recid = Recid(self.tx.index_size / 8);
        self.tx.index_size += 8;
        self.tx.mark_dirty();
        Ok(recid)
    }

    pub(super) fn release_recid(&mut self, recid: Recid) {
        self.stack_push(RECID_FREE_RECIDS, recid.0);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::error::StoreError;
    use crate::layout::{FIRST_USER_RECID, HEADER_SIZE, INITIAL_PHYS_SIZE, MAX_RECORD_SIZE};
    use crate::types::Recid;

    fn engine() -> Engine {
        Engine::open_in_memory().unwrap()
    }

    #[test]
    fn fresh_allocations_extend_space() {
        let mut engine = engine();
        let a = engine.allocate(10).unwrap();
        let b = engine.allocate(20).unwrap();
        assert_eq!(a, HEADER_SIZE);
        assert_eq!(b, HEADER_SIZE + 10);
        assert_eq!(engine.phys_size(), INITIAL_PHYS_SIZE + 30);
    }

    #[test]
    fn freed_region_is_reused_lifo() {
        let mut engine = engine();
        let a = engine.allocate(40).unwrap();
        let b = engine.allocate(40).unwrap();
        let _c = engine.allocate(40).unwrap();

        engine.free_region(a, 40).unwrap();
        engine.free_region(b, 40).unwrap();
        let size = engine.phys_size();

        assert_eq!(engine.allocate(40).unwrap(), b);
        assert_eq!(engine.allocate(40).unwrap(), a);
        assert_eq!(engine.phys_size(), size);
    }

    #[test]
    fn larger_region_is_split() {
        let mut engine = engine();
        let big = engine.allocate(100).unwrap();
        engine.free_region(big, 100).unwrap();

        let small = engine.allocate(30).unwrap();
        assert_eq!(small, big);
        // The remainder went back to the 70-byte class.
        assert_eq!(engine.allocate(70).unwrap(), big + 30);
    }

    #[test]
    fn coarse_class_never_returns_short_region() {
        let mut engine = engine();
        // 1536 and 1598 share a size class.
        let short = engine.allocate(1536).unwrap();
        engine.free_region(short, 1536).unwrap();

        let offset = engine.allocate(1598).unwrap();
        assert_ne!(offset, short);
    }

    #[test]
    fn segment_tail_is_padded() {
        let config = Config::new().segment_shift(17);
        let mut engine = Engine::open_in_memory_with_config(config).unwrap();
        let segment = engine.segment_size();

        let mut last = 0;
        while engine.phys_size() + MAX_RECORD_SIZE as u64 <= segment {
            last = engine.allocate_at_end(MAX_RECORD_SIZE).unwrap();
        }
        assert!(last < segment);

        let crossed = engine.allocate_at_end(MAX_RECORD_SIZE).unwrap();
        assert_eq!(crossed, segment);
        assert_eq!(engine.phys_size(), segment + MAX_RECORD_SIZE as u64);
    }

    #[test]
    fn free_invalid_region_is_corruption() {
        let mut engine = engine();
        assert!(matches!(
            engine.free_region(0, 10),
            Err(StoreError::Corruption { .. })
        ));
        assert!(matches!(
            engine.free_region(HEADER_SIZE, 0),
            Err(StoreError::Corruption { .. })
        ));
    }

    #[test]
    fn recids_are_recycled() {
        let mut engine = engine();
        let first = engine.allocate_recid().unwrap();
        let second = engine.allocate_recid().unwrap();
        assert_eq!(first, Recid(FIRST_USER_RECID));
        assert_eq!(second, Recid(FIRST_USER_RECID + 1));

        engine.release_recid(first);
        assert_eq!(engine.allocate_recid().unwrap(), first);
    }
}
