//! Storage-engine invariants (§8: properties 2, 3, 4) exercised with randomized
//! operation sequences — a cheap stand-in for the full concurrent scenario
//! (S6), which needs the node server's lock and lives in `loopcache-node`.

use loopcache_corelib::storage::{DeleteOutcome, GetOutcome, PutOutcome, Store};
use proptest::prelude::*;

#[test]
fn put_then_get_returns_same_value_until_overwritten() {
    let mut store = Store::new(1 << 16);
    store.put("k".into(), b"v1".to_vec());
    assert_eq!(store.get("k"), GetOutcome::Hit(b"v1".to_vec()));
    store.put("k".into(), b"v2".to_vec());
    assert_eq!(store.get("k"), GetOutcome::Hit(b"v2".to_vec()));
}

#[test]
fn delete_then_get_is_miss_until_new_put() {
    let mut store = Store::new(1 << 16);
    store.put("k".into(), b"v".to_vec());
    assert_eq!(store.delete("k"), DeleteOutcome::Ok);
    assert_eq!(store.get("k"), GetOutcome::Miss);
    store.put("k".into(), b"v2".to_vec());
    assert_eq!(store.get("k"), GetOutcome::Hit(b"v2".to_vec()));
}

proptest! {
    #[test]
    fn used_bytes_never_exceeds_max_bytes(
        max_bytes in 64u64..4096,
        ops in proptest::collection::vec((0u8..3, 0usize..20, proptest::collection::vec(any::<u8>(), 0..64)), 1..500),
    ) {
        let mut store = Store::new(max_bytes);
        for (op, key_id, value) in ops {
            let key = format!("k{key_id}");
            match op {
                0 => { store.put(key, value); }
                1 => { store.get(&key); }
                _ => { store.delete(&key); }
            }
            prop_assert!(store.used_bytes() <= store.max_bytes());
        }
    }

    #[test]
    fn clear_always_zeroes_accounting(
        puts in proptest::collection::vec((0usize..20, proptest::collection::vec(any::<u8>(), 0..32)), 0..100),
    ) {
        let mut store = Store::new(4096);
        for (key_id, value) in puts {
            store.put(format!("k{key_id}"), value);
        }
        store.clear();
        prop_assert_eq!(store.used_bytes(), 0);
        prop_assert_eq!(store.num_objects(), 0);
    }
}

#[test]
fn oversized_put_never_reports_ok() {
    let mut store = Store::new(50);
    let outcome = store.put("k".into(), vec![0u8; 1000]);
    assert_eq!(outcome, PutOutcome::OutOfRoom);
}
