//! Physical allocator behavior observed through the engine.

use recstore_core::layout::{HEADER_SIZE, MAX_RECORD_SIZE};
use recstore_core::{Engine, RecordManager};
use recstore_testkit::prelude::*;

#[test]
fn shrinking_update_space_is_reused() {
    with_temp_engine(|engine| {
        let recid = engine.put(&[7u8; 1000]).unwrap();
        engine.commit().unwrap();

        engine.update(recid, &[8u8; 100]).unwrap();
        let phys = engine.phys_size();
        let tail = engine.pointer(recid).unwrap().offset + 100;

        let other = engine.put(&[9u8; 900]).unwrap();
        assert_eq!(engine.phys_size(), phys);
        assert_eq!(engine.pointer(other).unwrap().offset, tail);
        assert_eq!(engine.get(recid).unwrap(), Some(vec![8u8; 100]));
        assert_eq!(engine.get(other).unwrap(), Some(vec![9u8; 900]));
    });
}

#[test]
fn shrink_space_is_reused_after_commit() {
    with_temp_engine(|engine| {
        let recid = engine.put(&[1u8; 1200]).unwrap();
        engine.update(recid, &[2u8; 400]).unwrap();
        engine.commit().unwrap();

        // The freed tail now lives on a persisted free-list page.
        let phys = engine.phys_size();
        engine.put(&[3u8; 800]).unwrap();
        assert_eq!(engine.phys_size(), phys);
        engine.commit().unwrap();
        assert!(engine.verify().unwrap().is_ok());
    });
}

#[test]
fn growing_update_moves_and_frees_old_region() {
    with_temp_engine(|engine| {
        let recid = engine.put(&[1u8; 64]).unwrap();
        let old = engine.pointer(recid).unwrap();

        engine.update(recid, &[2u8; 256]).unwrap();
        let new = engine.pointer(recid).unwrap();
        assert_ne!(new.offset, old.offset);
        assert_eq!(new.size, 256);

        let reuse = engine.put(&[3u8; 64]).unwrap();
        assert_eq!(engine.pointer(reuse).unwrap().offset, old.offset);
    });
}

#[test]
fn free_list_is_lifo() {
    with_temp_engine(|engine| {
        let a = engine.put(&[1u8; 40]).unwrap();
        let b = engine.put(&[2u8; 40]).unwrap();
        let a_off = engine.pointer(a).unwrap().offset;
        let b_off = engine.pointer(b).unwrap().offset;

        engine.delete(a).unwrap();
        engine.delete(b).unwrap();

        let first = engine.put(&[3u8; 40]).unwrap();
        let second = engine.put(&[4u8; 40]).unwrap();
        assert_eq!(engine.pointer(first).unwrap().offset, b_off);
        assert_eq!(engine.pointer(second).unwrap().offset, a_off);
    });
}

#[test]
fn free_list_is_lifo_across_commit() {
    with_temp_engine(|engine| {
        let recids: Vec<_> = (0..5u8).map(|i| engine.put(&[i; 24]).unwrap()).collect();
        engine.commit().unwrap();

        let freed = engine.pointer(recids[2]).unwrap().offset;
        engine.delete(recids[2]).unwrap();
        engine.commit().unwrap();

        let taken = engine.put(&[9u8; 24]).unwrap();
        assert_eq!(engine.pointer(taken).unwrap().offset, freed);
    });
}

#[test]
fn deleted_recids_are_reused() {
    with_temp_engine(|engine| {
        let a = engine.put(b"a").unwrap();
        let _b = engine.put(b"b").unwrap();
        engine.delete(a).unwrap();
        assert_eq!(engine.put(b"c").unwrap(), a);
    });
}

#[test]
fn regions_never_cross_segment_boundaries() {
    let mut engine = Engine::open_in_memory_with_config(small_segment_config()).unwrap();
    let segment = engine.segment_size();

    let first = engine.put(&vec![1u8; 60_000]).unwrap();
    let second = engine.put(&vec![2u8; 60_000]).unwrap();
    let third = engine.put(&vec![3u8; 60_000]).unwrap();

    assert_eq!(engine.pointer(first).unwrap().offset, HEADER_SIZE);
    assert_eq!(engine.pointer(second).unwrap().offset, HEADER_SIZE + 60_000);
    assert_eq!(engine.pointer(third).unwrap().offset, segment);

    let padding = segment - (HEADER_SIZE + 120_000);
    assert_eq!(engine.stats().unwrap().free_bytes, padding);
    engine.commit().unwrap();
    assert!(engine.verify().unwrap().is_ok());

    // The padding is ordinary free space.
    let filler = engine.put(&vec![4u8; 11_000]).unwrap();
    assert_eq!(engine.pointer(filler).unwrap().offset, HEADER_SIZE + 120_000);
    assert_eq!(engine.get(third).unwrap(), Some(vec![3u8; 60_000]));
    assert!(engine.verify().unwrap().is_ok());
}

#[test]
fn max_size_records_fill_segments() {
    let mut engine = Engine::open_in_memory_with_config(small_segment_config()).unwrap();
    let segment = engine.segment_size();

    let recids: Vec<_> = (0..6u8)
        .map(|i| engine.put(&vec![i; MAX_RECORD_SIZE]).unwrap())
        .collect();
    engine.commit().unwrap();

    for (i, recid) in recids.iter().enumerate() {
        let ptr = engine.pointer(*recid).unwrap();
        assert_eq!(ptr.offset / segment, ptr.end().saturating_sub(1) / segment);
        assert_eq!(engine.get(*recid).unwrap(), Some(vec![i as u8; MAX_RECORD_SIZE]));
    }
    let report = engine.verify().unwrap();
    assert!(report.is_ok(), "{report}");
}

#[test]
fn verify_after_churn_on_a_shared_store() {
    let (test_store, recids) = scenarios::populated_store(200, 48);
    for (i, recid) in recids.iter().enumerate() {
        match i % 3 {
            0 => test_store.delete(*recid).unwrap(),
            1 => test_store.update(*recid, &vec![0xAB; 16 + i]).unwrap(),
            _ => {}
        }
    }
    let report = test_store.verify().unwrap();
    assert!(report.is_ok(), "{report}");
    test_store.commit().unwrap();
    let report = test_store.verify().unwrap();
    assert!(report.is_ok(), "{report}");
    assert_eq!(report.stats.record_count, 200 - 67);
}
