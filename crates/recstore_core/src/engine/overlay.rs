//! Uncommitted state of the current transaction.

use crate::error::StoreResult;
use recstore_storage::SegmentedSpace;
use std::collections::{BTreeMap, HashMap};

/// Granularity of the copy-on-write data overlay.
const CHUNK_SIZE: u64 = 4096;

/// In-memory view of every change made since the last commit.
///
/// Reads consult the overlay first and fall back to the primary spaces, so
/// the transaction sees its own writes while the primaries stay untouched
/// until the sealed log is replayed.
#[derive(Debug, Default)]
pub(crate) struct TxOverlay {
    /// Index slots written in this transaction, by recid.
    index: HashMap<u64, u64>,
    /// Copy-on-write data chunks, by chunk number.
    chunks: HashMap<u64, Box<[u8]>>,
    /// Values pushed onto free-list stacks but not yet written to pages,
    /// keyed by the recid heading each stack.
    pub(crate) pending: BTreeMap<u64, Vec<u64>>,
    /// Physical size as seen by this transaction.
    pub(crate) phys_size: u64,
    /// Index size as seen by this transaction.
    pub(crate) index_size: u64,
    dirty: bool,
}

impl TxOverlay {
    pub(crate) fn new(phys_size: u64, index_size: u64) -> Self {
        Self {
            phys_size,
            index_size,
            ..Self::default()
        }
    }

    /// Drops every uncommitted change and restarts from the given counters.
    pub(crate) fn clear(&mut self, phys_size: u64, index_size: u64) {
        self.index.clear();
        self.chunks.clear();
        self.pending.clear();
        self.phys_size = phys_size;
        self.index_size = index_size;
        self.dirty = false;
    }

    /// Returns `true` once anything has been written.
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn read_index(&self, primary: &SegmentedSpace, recid: u64) -> StoreResult<u64> {
        if let Some(value) = self.index.get(&recid) {
            return Ok(*value);
        }
        let offset = recid * 8;
        if offset + 8 > primary.available() {
            return Ok(0);
        }
        Ok(primary.read_u64(offset)?)
    }

    pub(crate) fn write_index(&mut self, recid: u64, value: u64) {
        self.index.insert(recid, value);
        self.dirty = true;
    }

    /// Reads data bytes, preferring overlay chunks. Bytes beyond the
    /// primary's addressable range read as zero.
    pub(crate) fn read_data(
        &self,
        primary: &SegmentedSpace,
        offset: u64,
        buf: &mut [u8],
    ) -> StoreResult<()> {
        let mut done = 0usize;
        while done < buf.len() {
            let at = offset + done as u64;
            let chunk = at / CHUNK_SIZE;
            let local = (at % CHUNK_SIZE) as usize;
            let n = (buf.len() - done).min(CHUNK_SIZE as usize - local);
            let out = &mut buf[done..done + n];
            match self.chunks.get(&chunk) {
                Some(bytes) => out.copy_from_slice(&bytes[local..local + n]),
                None => read_primary(primary, at, out)?,
            }
            done += n;
        }
        Ok(())
    }

    pub(crate) fn write_data(
        &mut self,
        primary: &SegmentedSpace,
        offset: u64,
        data: &[u8],
    ) -> StoreResult<()> {
        let mut done = 0usize;
        while done < data.len() {
            let at = offset + done as u64;
            let chunk = at / CHUNK_SIZE;
            let local = (at % CHUNK_SIZE) as usize;
            let n = (data.len() - done).min(CHUNK_SIZE as usize - local);
            if !self.chunks.contains_key(&chunk) {
                let mut fresh = vec![0u8; CHUNK_SIZE as usize].into_boxed_slice();
                read_primary(primary, chunk * CHUNK_SIZE, &mut fresh)?;
                self.chunks.insert(chunk, fresh);
            }
            if let Some(bytes) = self.chunks.get_mut(&chunk) {
                bytes[local..local + n].copy_from_slice(&data[done..done + n]);
            }
            done += n;
        }
        self.dirty = true;
        Ok(())
    }

    /// Number of data chunks copied into the overlay.
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Copies the addressable part of `[offset, offset + out.len())` from the
/// primary and zero-fills the rest.
fn read_primary(primary: &SegmentedSpace, offset: u64, out: &mut [u8]) -> StoreResult<()> {
    let available = primary.available();
    let readable = available.saturating_sub(offset).min(out.len() as u64) as usize;
    if readable > 0 {
        primary.read_into(offset, &mut out[..readable])?;
    }
    out[readable..].fill(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_with(bytes: &[u8]) -> SegmentedSpace {
        let mut space = SegmentedSpace::in_memory();
        space.ensure_available(bytes.len() as u64).unwrap();
        space.write_bytes(0, bytes).unwrap();
        space
    }

    #[test]
    fn index_falls_back_to_primary() {
        let mut primary = SegmentedSpace::in_memory();
        primary.ensure_available(32).unwrap();
        primary.write_u64(16, 77).unwrap();

        let mut overlay = TxOverlay::new(0, 32);
        assert_eq!(overlay.read_index(&primary, 2).unwrap(), 77);
        assert_eq!(overlay.read_index(&primary, 100).unwrap(), 0);

        overlay.write_index(2, 5);
        assert_eq!(overlay.read_index(&primary, 2).unwrap(), 5);
        assert_eq!(primary.read_u64(16).unwrap(), 77);
        assert!(overlay.is_dirty());
    }

    #[test]
    fn data_write_is_copy_on_write() {
        let primary = primary_with(&[1u8; 100]);
        let mut overlay = TxOverlay::new(100, 0);

        overlay.write_data(&primary, 10, &[9, 9, 9]).unwrap();

        let mut buf = [0u8; 6];
        overlay.read_data(&primary, 8, &mut buf).unwrap();
        assert_eq!(buf, [1, 1, 9, 9, 9, 1]);
        assert_eq!(primary.read_bytes(10, 3).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn write_across_chunk_boundary() {
        let primary = SegmentedSpace::in_memory();
        let mut overlay = TxOverlay::new(0, 0);
        let data: Vec<u8> = (0..200).map(|i| i as u8).collect();

        overlay.write_data(&primary, CHUNK_SIZE - 100, &data).unwrap();
        assert_eq!(overlay.chunk_count(), 2);

        let mut buf = vec![0u8; 200];
        overlay
            .read_data(&primary, CHUNK_SIZE - 100, &mut buf)
            .unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn unwritten_bytes_past_primary_read_as_zero() {
        let primary = primary_with(&[3u8; 10]);
        let overlay = TxOverlay::new(10, 0);

        let mut buf = [0xFFu8; 20];
        overlay.read_data(&primary, 0, &mut buf).unwrap();
        assert_eq!(&buf[..10], &[3u8; 10]);
        assert_eq!(&buf[10..], &[0u8; 10]);
    }

    #[test]
    fn clear_resets_everything() {
        let primary = SegmentedSpace::in_memory();
        let mut overlay = TxOverlay::new(8, 16);
        overlay.write_index(4, 1);
        overlay.write_data(&primary, 8, &[1]).unwrap();
        overlay.pending.entry(4).or_default().push(9);
        overlay.phys_size = 100;

        overlay.clear(8, 16);
        assert!(!overlay.is_dirty());
        assert_eq!(overlay.chunk_count(), 0);
        assert!(overlay.pending.is_empty());
        assert_eq!(overlay.phys_size, 8);
        assert_eq!(overlay.read_index(&primary, 4).unwrap(), 0);
    }
}
