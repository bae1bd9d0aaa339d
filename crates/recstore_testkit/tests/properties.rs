//! Property-based tests over random payloads and operation sequences.

use proptest::prelude::*;
use recstore_core::{Config, RecordManager, Store, WriteBehind};
use recstore_testkit::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn round_trip(payloads in prop::collection::vec(payload_strategy(), 1..8)) {
        let store = Store::open_in_memory().unwrap();
        let recids: Vec<_> = payloads.iter().map(|p| store.put(p).unwrap()).collect();
        for (recid, payload) in recids.iter().zip(&payloads) {
            let got = store.get(*recid).unwrap();
            prop_assert_eq!(got.as_ref(), Some(payload));
        }
        store.commit().unwrap();
        for (recid, payload) in recids.iter().zip(&payloads) {
            let got = store.get_committed(*recid).unwrap();
            prop_assert_eq!(got.as_ref(), Some(payload));
        }
    }

    #[test]
    fn update_round_trip(first in payload_strategy(), second in payload_strategy()) {
        let store = Store::open_in_memory().unwrap();
        let recid = store.put(&first).unwrap();
        store.update(recid, &second).unwrap();
        prop_assert_eq!(store.get(recid).unwrap(), Some(second));
        let report = store.verify().unwrap();
        prop_assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn store_matches_model(ops in operation_sequence_strategy(1, 60)) {
        let store = Store::open_in_memory().unwrap();
        let mut model = ModelStore::new();
        model.run(&store, &ops).map_err(TestCaseError::fail)?;
        model.check_all(&store).map_err(TestCaseError::fail)?;
        let report = store.verify().unwrap();
        prop_assert!(report.is_ok(), "{}", report);
        prop_assert_eq!(report.stats.record_count, model.current().len() as u64);
    }

    #[test]
    fn small_segment_store_matches_model(ops in operation_sequence_strategy(1, 60)) {
        let store = Store::open_in_memory_with_config(small_segment_config()).unwrap();
        let mut model = ModelStore::new();
        model.run(&store, &ops).map_err(TestCaseError::fail)?;
        store.commit().unwrap();
        let report = store.verify().unwrap();
        prop_assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn write_behind_matches_model(ops in operation_sequence_strategy(1, 40)) {
        let pipeline = WriteBehind::with_capacity(Store::open_in_memory().unwrap(), 4).unwrap();
        let mut model = ModelStore::new();
        model.run(&pipeline, &ops).map_err(TestCaseError::fail)?;
        model.check_all(&pipeline).map_err(TestCaseError::fail)?;

        pipeline.commit().unwrap();
        // The worker may already be refilling its pool, so compare the
        // committed state rather than the inner transaction.
        for recid in model.known() {
            let committed = pipeline.inner().get_committed(*recid).unwrap();
            prop_assert_eq!(committed.as_ref(), model.current().get(recid));
        }
        let report = pipeline.inner().verify().unwrap();
        prop_assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn committed_state_survives_reopen(ops in operation_sequence_strategy(1, 40)) {
        let mut test_store = TestStore::file_with_config(Config::default().sync_on_commit(false));
        let mut model = ModelStore::new();
        model.run(&*test_store, &ops).map_err(TestCaseError::fail)?;

        test_store.reopen();
        model.discard_uncommitted();
        model.check_all(&*test_store).map_err(TestCaseError::fail)?;
        let report = test_store.verify().unwrap();
        prop_assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn named_roots_track_last_binding(
        bindings in prop::collection::vec((root_name_strategy(), any::<bool>()), 1..20)
    ) {
        let store = Store::open_in_memory().unwrap();
        let target = store.put(b"node").unwrap();
        let mut expected = std::collections::BTreeMap::new();
        for (name, bind) in &bindings {
            let value = bind.then_some(target);
            store.set_named(name, value).unwrap();
            match value {
                Some(recid) => expected.insert(name.clone(), recid),
                None => expected.remove(name),
            };
        }
        store.commit().unwrap();
        prop_assert_eq!(store.named_roots().unwrap(), expected);
    }
}
