//! Reference model for operation-sequence testing.
//!
//! [`ModelStore`] tracks what every recid should hold, both in the open
//! transaction and as of the last commit, and checks a real
//! [`RecordManager`] against it step by step.

use crate::generators::StoreOperation;
use recstore_core::{Recid, RecordManager, StoreError};
use std::collections::BTreeMap;

/// Expected contents of a store.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    committed: BTreeMap<Recid, Vec<u8>>,
    current: BTreeMap<Recid, Vec<u8>>,
    known: Vec<Recid>,
}

impl ModelStore {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records visible in the open transaction.
    pub fn current(&self) -> &BTreeMap<Recid, Vec<u8>> {
        &self.current
    }

    /// Records as of the last commit.
    pub fn committed(&self) -> &BTreeMap<Recid, Vec<u8>> {
        &self.committed
    }

    /// Every recid handed out so far, live or not.
    pub fn known(&self) -> &[Recid] {
        &self.known
    }

    /// Forgets the open transaction, as a close or crash does.
    pub fn discard_uncommitted(&mut self) {
        self.current = self.committed.clone();
    }

    fn pick(&self, slot: usize) -> Option<Recid> {
        if self.known.is_empty() {
            None
        } else {
            Some(self.known[slot % self.known.len()])
        }
    }

    /// Applies `op` to both `store` and the model, failing on the first
    /// divergence.
    pub fn apply<R: RecordManager + ?Sized>(
        &mut self,
        store: &R,
        op: &StoreOperation,
    ) -> Result<(), String> {
        match op {
            StoreOperation::Put { data } => {
                let recid = store.put(data).map_err(|e| format!("put failed: {e}"))?;
                if self.current.contains_key(&recid) {
                    return Err(format!("put returned live {recid}"));
                }
                self.current.insert(recid, data.clone());
                if !self.known.contains(&recid) {
                    self.known.push(recid);
                }
            }
            StoreOperation::Update { slot, data } => {
                let Some(recid) = self.pick(*slot) else {
                    return Ok(());
                };
                let result = store.update(recid, data);
                match (self.current.contains_key(&recid), result) {
                    (true, Ok(())) => {
                        self.current.insert(recid, data.clone());
                    }
                    (false, Err(StoreError::RecordNotFound { .. })) => {}
                    (live, other) => {
                        return Err(format!("update of {recid} (live: {live}) gave {other:?}"));
                    }
                }
            }
            StoreOperation::Delete { slot } => {
                let Some(recid) = self.pick(*slot) else {
                    return Ok(());
                };
                store
                    .delete(recid)
                    .map_err(|e| format!("delete of {recid} failed: {e}"))?;
                self.current.remove(&recid);
            }
            StoreOperation::Get { slot } => {
                let Some(recid) = self.pick(*slot) else {
                    return Ok(());
                };
                self.check_one(store, recid)?;
            }
            StoreOperation::Commit => {
                store.commit().map_err(|e| format!("commit failed: {e}"))?;
                self.committed = self.current.clone();
            }
            StoreOperation::Rollback => {
                store.rollback().map_err(|e| format!("rollback failed: {e}"))?;
                self.discard_uncommitted();
            }
        }
        Ok(())
    }

    /// Applies every operation in order.
    pub fn run<R: RecordManager + ?Sized>(
        &mut self,
        store: &R,
        ops: &[StoreOperation],
    ) -> Result<(), String> {
        for (step, op) in ops.iter().enumerate() {
            self.apply(store, op)
                .map_err(|e| format!("step {step} ({op:?}): {e}"))?;
        }
        Ok(())
    }

    fn check_one<R: RecordManager + ?Sized>(&self, store: &R, recid: Recid) -> Result<(), String> {
        let actual = store
            .get(recid)
            .map_err(|e| format!("get of {recid} failed: {e}"))?;
        let expected = self.current.get(&recid);
        if actual.as_ref() != expected {
            return Err(format!(
                "{recid}: expected {:?} bytes, store has {:?} bytes",
                expected.map(Vec::len),
                actual.as_ref().map(Vec::len)
            ));
        }
        Ok(())
    }

    /// Checks every known recid against the open transaction.
    pub fn check_all<R: RecordManager + ?Sized>(&self, store: &R) -> Result<(), String> {
        self.known
            .iter()
            .try_for_each(|recid| self.check_one(store, *recid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recstore_core::Store;

    #[test]
    fn model_tracks_rollback() {
        let store = Store::open_in_memory().unwrap();
        let mut model = ModelStore::new();
        let ops = vec![
            StoreOperation::Put { data: b"a".to_vec() },
            StoreOperation::Commit,
            StoreOperation::Update {
                slot: 0,
                data: b"bb".to_vec(),
            },
            StoreOperation::Put { data: b"c".to_vec() },
            StoreOperation::Rollback,
            StoreOperation::Get { slot: 0 },
            StoreOperation::Get { slot: 1 },
        ];
        model.run(&store, &ops).unwrap();
        assert_eq!(model.current().len(), 1);
        model.check_all(&store).unwrap();
    }

    #[test]
    fn operations_on_empty_model_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        let mut model = ModelStore::new();
        model
            .run(
                &store,
                &[
                    StoreOperation::Delete { slot: 3 },
                    StoreOperation::Get { slot: 0 },
                ],
            )
            .unwrap();
        assert!(model.known().is_empty());
    }
}
