//! Statistics and integrity checks.

use super::Engine;
use crate::error::StoreResult;
use crate::layout::{
    free_stack_recid, is_user_recid, size_to_slot, FIRST_USER_RECID, HEADER_SIZE,
    RECID_FREE_RECIDS, RECID_NAMED_ROOTS, SLOT_COUNT, STACK_PAGE_SIZE,
};
use crate::types::{Recid, RecordPointer};
use std::collections::HashSet;
use std::fmt;

/// Store statistics, as seen by the current transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Size of the record index in bytes.
    pub index_size: u64,
    /// Size of the physical space in bytes.
    pub phys_size: u64,
    /// Number of live user records.
    pub record_count: u64,
    /// Payload bytes held by live user records.
    pub live_bytes: u64,
    /// Bytes held in free regions.
    pub free_bytes: u64,
    /// Number of free regions.
    pub free_regions: u64,
    /// Number of free-list stack pages.
    pub stack_pages: u64,
    /// Number of recids waiting for reuse.
    pub free_recids: u64,
    /// Whether uncommitted changes exist.
    pub in_transaction: bool,
}

/// Outcome of [`Engine::verify`].
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Statistics gathered during the walk.
    pub stats: StoreStats,
    /// Every inconsistency found, in discovery order.
    pub problems: Vec<String>,
}

impl VerifyReport {
    /// Returns `true` if no problem was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "ok");
        }
        writeln!(f, "{} problem(s):", self.problems.len())?;
        for problem in &self.problems {
            writeln!(f, "  - {problem}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Owner {
    Record(Recid),
    Free { slot: usize },
    Page { stack: u64 },
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(recid) => write!(f, "record {recid}"),
            Self::Free { slot } => write!(f, "free region in class {slot}"),
            Self::Page { stack } => write!(f, "page of stack {stack}"),
        }
    }
}

struct Walk {
    ranges: Vec<(u64, u64, Owner)>,
    report: VerifyReport,
}

impl Engine {
    /// Returns store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or a free-list page cannot be read.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        Ok(self.walk()?.report.stats)
    }

    /// Checks the structural invariants of the store.
    ///
    /// Every record, free region and free-list page is collected, then:
    ///
    /// - free regions must sit in the class matching their size
    /// - no two ranges may overlap or cross a segment boundary
    /// - together with the header they must cover the physical space exactly
    /// - free recids must be unique, unassigned user recids
    ///
    /// Pending pushes of the open transaction are included.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading fails; inconsistencies are reported
    /// in [`VerifyReport::problems`].
    pub fn verify(&self) -> StoreResult<VerifyReport> {
        let mut walk = self.walk()?;
        self.check_coverage(&mut walk);
        Ok(walk.report)
    }

    fn walk(&self) -> StoreResult<Walk> {
        let mut walk = Walk {
            ranges: Vec::new(),
            report: VerifyReport::default(),
        };
        walk.report.stats.index_size = self.tx.index_size;
        walk.report.stats.phys_size = self.tx.phys_size;
        walk.report.stats.in_transaction = self.tx.is_dirty();

        let named = RecordPointer::unpack(self.index_get(RECID_NAMED_ROOTS)?);
        if !named.is_null() && named.size > 0 {
            walk.ranges
                .push((named.offset, named.end(), Owner::Record(Recid(RECID_NAMED_ROOTS))));
        }

        for id in FIRST_USER_RECID..self.tx.index_size / 8 {
            let ptr = RecordPointer::unpack(self.index_get(id)?);
            if ptr.is_null() {
                continue;
            }
            walk.report.stats.record_count += 1;
            walk.report.stats.live_bytes += u64::from(ptr.size);
            if ptr.size > 0 {
                walk.ranges.push((ptr.offset, ptr.end(), Owner::Record(Recid(id))));
            }
        }

        for slot in 0..SLOT_COUNT {
            let stack = free_stack_recid(slot);
            for value in self.stack_values(stack, &mut walk)? {
                let region = RecordPointer::unpack(value);
                if region.size == 0 || region.offset == 0 {
                    walk.report
                        .problems
                        .push(format!("stack {stack} holds invalid region {region}"));
                    continue;
                }
                if size_to_slot(usize::from(region.size)) != slot {
                    walk.report.problems.push(format!(
                        "free region {region} filed under class {slot}"
                    ));
                }
                walk.report.stats.free_regions += 1;
                walk.report.stats.free_bytes += u64::from(region.size);
                walk.ranges
                    .push((region.offset, region.end(), Owner::Free { slot }));
            }
        }

        let mut seen = HashSet::new();
        for value in self.stack_values(RECID_FREE_RECIDS, &mut walk)? {
            let recid = Recid(value);
            walk.report.stats.free_recids += 1;
            if !is_user_recid(recid) || !recid.within(self.tx.index_size) {
                walk.report
                    .problems
                    .push(format!("free-recid stack holds out-of-range {recid}"));
            } else if self.index_get(value)? != 0 {
                walk.report
                    .problems
                    .push(format!("free-recid stack holds live {recid}"));
            }
            if !seen.insert(value) {
                walk.report
                    .problems
                    .push(format!("free-recid stack holds {recid} twice"));
            }
        }

        Ok(walk)
    }

    /// Collects the values of one stack, persisted pages first, and records
    /// its pages as ranges.
    fn stack_values(&self, stack: u64, walk: &mut Walk) -> StoreResult<Vec<u64>> {
        let mut values = Vec::new();
        let mut visited = HashSet::new();
        let mut head = self.index_get(stack)?;
        while head != 0 {
            let page = match self.read_stack_page(head) {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    walk.report.problems.push(format!("stack {stack}: {e}"));
                    break;
                }
            };
            if !visited.insert(page.offset) {
                walk.report
                    .problems
                    .push(format!("stack {stack} has a cycle at page {}", page.offset));
                break;
            }
            walk.report.stats.stack_pages += 1;
            walk.ranges.push((
                page.offset,
                page.offset + STACK_PAGE_SIZE as u64,
                Owner::Page { stack },
            ));
            for i in 0..page.count {
                values.push(self.phys_read_u64(page.slot_offset(i))?);
            }
            head = page.previous;
        }
        if let Some(pending) = self.tx.pending.get(&stack) {
            values.extend_from_slice(pending);
        }
        Ok(values)
    }

    fn check_coverage(&self, walk: &mut Walk) {
        let segment = self.data.segment_size();
        let phys_size = self.tx.phys_size;
        walk.ranges.sort_by_key(|&(start, end, _)| (start, end));

        let mut cursor = HEADER_SIZE;
        for &(start, end, owner) in &walk.ranges {
            let problems = &mut walk.report.problems;
            if start < cursor {
                problems.push(format!("{owner} at {start}..{end} overlaps a previous range"));
            } else if start > cursor {
                problems.push(format!("{} unaccounted bytes at {cursor}..{start}", start - cursor));
            }
            if start / segment != (end - 1) / segment {
                problems.push(format!("{owner} at {start}..{end} crosses a segment boundary"));
            }
            if end > phys_size {
                problems.push(format!("{owner} at {start}..{end} ends past physical size {phys_size}"));
            }
            cursor = cursor.max(end);
        }
        if cursor < phys_size {
            walk.report.problems.push(format!(
                "{} unaccounted bytes at {cursor}..{phys_size}",
                phys_size - cursor
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::types::Recid;

    #[test]
    fn fresh_store_verifies() {
        let engine = Engine::open_in_memory().unwrap();
        let report = engine.verify().unwrap();
        assert!(report.is_ok(), "{report}");
        assert_eq!(report.stats.record_count, 0);
    }

    #[test]
    fn stats_track_records_and_free_space() {
        let mut engine = Engine::open_in_memory().unwrap();
        let a = engine.put(b"hello").unwrap();
        engine.put(b"world!").unwrap();
        engine.update(a, b"hi").unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.record_count, 2);
        assert_eq!(stats.live_bytes, 8);
        assert_eq!(stats.free_bytes, 3);
        assert_eq!(stats.free_regions, 1);
        assert!(stats.in_transaction);
    }

    #[test]
    fn mixed_workload_verifies_before_and_after_commit() {
        let config = Config::new().segment_shift(17);
        let mut engine = Engine::open_in_memory_with_config(config).unwrap();

        let mut recids = Vec::new();
        for i in 0..300usize {
            let len = (i * 397) % 3000;
            recids.push(engine.put(&vec![i as u8; len]).unwrap());
        }
        for (i, recid) in recids.iter().enumerate() {
            match i % 3 {
                0 => engine.delete(*recid).unwrap(),
                1 => engine.update(*recid, &vec![1u8; (i * 31) % 5000]).unwrap(),
                _ => {}
            }
        }
        let report = engine.verify().unwrap();
        assert!(report.is_ok(), "{report}");

        engine.commit().unwrap();
        let report = engine.verify().unwrap();
        assert!(report.is_ok(), "{report}");
        assert_eq!(report.stats.record_count, 200);
        assert_eq!(report.stats.free_recids, 100);
        assert!(!report.stats.in_transaction);
    }

    #[test]
    fn deleted_recid_listed_once() {
        let mut engine = Engine::open_in_memory().unwrap();
        let recid = engine.put(b"x").unwrap();
        engine.delete(recid).unwrap();
        engine.delete(recid).unwrap();
        engine.commit().unwrap();

        let report = engine.verify().unwrap();
        assert!(report.is_ok(), "{report}");
        assert_eq!(report.stats.free_recids, 1);
        assert_eq!(engine.get(Recid(recid.0)).unwrap(), None);
    }
}
