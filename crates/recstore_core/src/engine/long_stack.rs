//! Persistent free-list stacks.
//!
//! Each stack is headed by an index slot holding a packed pointer to its
//! current page (see [`crate::layout`] for the page format). During a
//! transaction, pushes only land in [`TxOverlay::pending`] and are written
//! to pages at commit; pops consume pending values first and then the
//! persisted pages, through the logged accessors.
//!
//! [`TxOverlay::pending`]: super::overlay::TxOverlay

use super::Engine;
use crate::error::{StoreError, StoreResult};
use crate::layout::{
    free_stack_recid, size_to_slot, STACK_PAGE_CAPACITY, STACK_PAGE_COUNT_OFFSET, STACK_PAGE_SIZE,
    STACK_PAGE_SLOTS_OFFSET,
};
use crate::types::RecordPointer;

/// A stack page as found through a stack head.
#[derive(Debug, Clone, Copy)]
pub(super) struct StackPage {
    pub(super) offset: u64,
    pub(super) count: usize,
    pub(super) previous: u64,
}

impl StackPage {
    pub(super) fn slot_offset(&self, index: usize) -> u64 {
        self.offset + STACK_PAGE_SLOTS_OFFSET + 8 * index as u64
    }
}

impl Engine {
    pub(super) fn stack_push(&mut self, stack: u64, value: u64) {
        self.tx.pending.entry(stack).or_default().push(value);
        self.tx.mark_dirty();
    }

    pub(super) fn stack_pop(&mut self, stack: u64) -> StoreResult<Option<u64>> {
        if let Some(values) = self.tx.pending.get_mut(&stack) {
            if let Some(value) = values.pop() {
                if values.is_empty() {
                    self.tx.pending.remove(&stack);
                }
                return Ok(Some(value));
            }
        }

        let head = self.index_get(stack)?;
        let Some(page) = self.read_stack_page(head)? else {
            return Ok(None);
        };
        let value = self.phys_read_u64(page.slot_offset(page.count - 1))?;

        if page.count == 1 {
            self.index_set(stack, page.previous)?;
            let released = RecordPointer::new(STACK_PAGE_SIZE as u16, page.offset);
            self.stack_push(
                free_stack_recid(size_to_slot(STACK_PAGE_SIZE)),
                released.pack(),
            );
        } else {
            self.phys_write_u8(
                page.offset + STACK_PAGE_COUNT_OFFSET,
                (page.count - 1) as u8,
            )?;
        }
        Ok(Some(value))
    }

    /// Resolves a packed page pointer; `None` for an empty stack.
    pub(super) fn read_stack_page(&self, head: u64) -> StoreResult<Option<StackPage>> {
        if head == 0 {
            return Ok(None);
        }
        let ptr = RecordPointer::unpack(head);
        if usize::from(ptr.size) != STACK_PAGE_SIZE
            || ptr.offset == 0
            || ptr.end() > self.tx.phys_size
        {
            return Err(StoreError::corruption(format!(
                "invalid free-list page pointer {ptr}"
            )));
        }
        let count = usize::from(self.phys_read_u8(ptr.offset + STACK_PAGE_COUNT_OFFSET)?);
        if count == 0 || count > STACK_PAGE_CAPACITY {
            return Err(StoreError::corruption(format!(
                "free-list page at {} holds {count} values",
                ptr.offset
            )));
        }
        Ok(Some(StackPage {
            offset: ptr.offset,
            count,
            previous: self.phys_read_u64(ptr.offset)?,
        }))
    }

    /// Writes every pending push to the persisted stack pages.
    ///
    /// New pages are carved from the end of the physical space. That can
    /// pad a segment tail, which queues more pushes, so this loops until
    /// nothing is pending.
    pub(super) fn materialize_stacks(&mut self) -> StoreResult<()> {
        while let Some(stack) = self.tx.pending.keys().next().copied() {
            let values = self.tx.pending.remove(&stack).unwrap_or_default();
            for value in values {
                self.persist_push(stack, value)?;
            }
        }
        Ok(())
    }

    fn persist_push(&mut self, stack: u64, value: u64) -> StoreResult<()> {
        let head = self.index_get(stack)?;
        if let Some(page) = self.read_stack_page(head)? {
            if page.count < STACK_PAGE_CAPACITY {
                self.phys_write_u64(page.slot_offset(page.count), value)?;
                return self.phys_write_u8(
                    page.offset + STACK_PAGE_COUNT_OFFSET,
                    (page.count + 1) as u8,
                );
            }
        }

        let offset = self.allocate_at_end(STACK_PAGE_SIZE)?;
        self.phys_write_u64(offset, head)?;
        self.phys_write_u8(offset + STACK_PAGE_COUNT_OFFSET, 1)?;
        self.phys_write_u64(offset + STACK_PAGE_SLOTS_OFFSET, value)?;
        let page = RecordPointer::new(STACK_PAGE_SIZE as u16, offset);
        self.index_set(stack, page.pack())
    }
}
