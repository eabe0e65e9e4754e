// adapted from: https://github.com/jonhoo/flurry/blob/main/tests/basic.rs

use nbhm::{BuildError, Guard, HashMap};

use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use std::sync::Arc;

mod common;
use common::with_map;

#[test]
fn new() {
    with_map::<usize, usize>(|map| drop(map()));
}

#[test]
fn clear() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        {
            map.insert(0, 1, &guard);
            map.insert(1, 1, &guard);
            map.insert(2, 1, &guard);
            map.insert(3, 1, &guard);
            map.insert(4, 1, &guard);
        }
        map.clear(&guard);
        assert!(map.is_empty());
        assert!(map.get(&0, &guard).is_none());
    });
}

#[test]
fn insert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let old = map.insert(42, 0, &guard);
        assert!(old.is_none());
    });
}

#[test]
fn get_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let e = map.get(&42, &guard);
        assert!(e.is_none());
    });
}

#[test]
fn get_key_value_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let e = map.get_key_value(&42, &guard);
        assert!(e.is_none());
    });
}

#[test]
fn remove_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        let old = map.remove(&42, &guard);
        assert!(old.is_none());
        assert!(map.is_empty());
    });
}

#[test]
fn insert_and_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        let old = map.remove(&42, &guard).unwrap();
        assert_eq!(old, &0);
        assert!(map.get(&42, &guard).is_none());
    });
}

#[test]
fn insert_and_get() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0, &map.guard());

        {
            let guard = map.guard();
            let e = map.get(&42, &guard).unwrap();
            assert_eq!(e, &0);
        }
    });
}

#[test]
fn insert_and_get_key_value() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0, &map.guard());

        {
            let guard = map.guard();
            let e = map.get_key_value(&42, &guard).unwrap();
            assert_eq!(e, (&42, &0));
        }
    });
}

#[test]
fn reinsert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        let old = map.insert(42, 1, &guard);
        assert_eq!(old, Some(&0));

        {
            let guard = map.guard();
            let e = map.get(&42, &guard).unwrap();
            assert_eq!(e, &1);
        }

        assert_eq!(map.len(), 1);
    });
}

#[test]
fn insert_after_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        map.remove(&42, &guard);
        assert_eq!(map.insert(42, 1, &guard), None);
        assert_eq!(map.get(&42, &guard), Some(&1));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn insert_if_absent() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        assert_eq!(map.insert_if_absent(42, 0, &guard), None);
        assert_eq!(map.insert_if_absent(42, 1, &guard), Some(&0));
        assert_eq!(map.get(&42, &guard), Some(&0));

        // A removed key is absent again.
        map.remove(&42, &guard);
        assert_eq!(map.insert_if_absent(42, 2, &guard), None);
        assert_eq!(map.get(&42, &guard), Some(&2));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn replace() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        assert_eq!(map.replace(&42, 0, &guard), None);
        assert!(!map.contains_key(&42, &guard));

        map.insert(42, 0, &guard);
        assert_eq!(map.replace(&42, 1, &guard), Some(&0));
        assert_eq!(map.get(&42, &guard), Some(&1));

        map.remove(&42, &guard);
        assert_eq!(map.replace(&42, 2, &guard), None);
        assert!(map.is_empty());
    });
}

#[test]
fn compare_and_replace() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        assert!(!map.compare_and_replace(&42, &0, 1, &guard));
        assert!(map.is_empty());

        map.insert(42, 0, &guard);
        assert!(!map.compare_and_replace(&42, &7, 1, &guard));
        assert_eq!(map.get(&42, &guard), Some(&0));

        assert!(map.compare_and_replace(&42, &0, 1, &guard));
        assert_eq!(map.get(&42, &guard), Some(&1));

        // The expectation is stale now.
        assert!(!map.compare_and_replace(&42, &0, 2, &guard));
        assert_eq!(map.get(&42, &guard), Some(&1));
    });
}

#[test]
fn compare_and_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        assert!(!map.compare_and_remove(&42, &0, &guard));

        map.insert(42, 0, &guard);
        assert!(!map.compare_and_remove(&42, &1, &guard));
        assert_eq!(map.get(&42, &guard), Some(&0));

        assert!(map.compare_and_remove(&42, &0, &guard));
        assert!(map.get(&42, &guard).is_none());
        assert!(!map.compare_and_remove(&42, &0, &guard));
        assert!(map.is_empty());
    });
}

#[test]
fn contains_value() {
    with_map::<usize, &'static str>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(1, "a", &guard);
        map.insert(2, "b", &guard);

        assert!(map.contains_value(&"a", &guard));
        assert!(!map.contains_value(&"c", &guard));

        map.remove(&1, &guard);
        assert!(!map.contains_value(&"a", &guard));
    });
}

#[test]
fn borrowed_keys() {
    with_map::<String, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert("a".to_owned(), 1, &guard);

        assert_eq!(map.get("a", &guard), Some(&1));
        assert!(map.contains_key("a", &guard));
        assert_eq!(map.replace("a", 2, &guard), Some(&1));
        assert!(map.compare_and_remove("a", &2, &guard));
        assert!(!map.contains_key("a", &guard));
    });
}

#[test]
fn concurrent_insert() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        let map1 = map.clone();
        let t1 = std::thread::spawn(move || {
            for i in 0..64 {
                map1.insert(i, 0, &map1.guard());
            }
        });
        let map2 = map.clone();
        let t2 = std::thread::spawn(move || {
            for i in 0..64 {
                map2.insert(i, 1, &map2.guard());
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        let guard = map.guard();
        for i in 0..64 {
            let v = map.get(&i, &guard).unwrap();
            assert!(v == &0 || v == &1);

            let kv = map.get_key_value(&i, &guard).unwrap();
            assert!(kv == (&i, &0) || kv == (&i, &1));
        }

        assert_eq!(map.len(), 64);
    });
}

#[test]
fn concurrent_remove() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let guard = map.guard();
            for i in 0..64 {
                map.insert(i, i, &guard);
            }
        }

        let map1 = map.clone();
        let t1 = std::thread::spawn(move || {
            let guard = map1.guard();
            for i in 0..64 {
                if let Some(v) = map1.remove(&i, &guard) {
                    assert_eq!(v, &i);
                }
            }
        });
        let map2 = map.clone();
        let t2 = std::thread::spawn(move || {
            let guard = map2.guard();
            for i in 0..64 {
                if let Some(v) = map2.remove(&i, &guard) {
                    assert_eq!(v, &i);
                }
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        // after joining the threads, the map should be empty
        let guard = map.guard();
        for i in 0..64 {
            assert!(map.get(&i, &guard).is_none());
        }
        assert!(map.is_empty());
    });
}

#[test]
fn concurrent_compare_and_replace() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let guard = map.guard();
            for i in 0..64 {
                map.insert(i, i, &guard);
            }
        }

        // Both threads increment every value once, retrying lost races.
        let increment = |map: Arc<HashMap<usize, usize>>| {
            move || {
                let guard = map.guard();
                for i in 0..64 {
                    loop {
                        let current = *map.get(&i, &guard).unwrap();
                        if map.compare_and_replace(&i, &current, current + 1, &guard) {
                            assert!(current == i || current == i + 1);
                            break;
                        }
                    }
                }
            }
        };

        let t1 = std::thread::spawn(increment(map.clone()));
        let t2 = std::thread::spawn(increment(map.clone()));

        t1.join().unwrap();
        t2.join().unwrap();

        let guard = map.guard();
        for i in 0..64 {
            assert_eq!(map.get(&i, &guard), Some(&(i + 2)));
        }
    });
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_resize_and_get() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let guard = map.guard();
            for i in 0..1024 {
                map.insert(i, i, &guard);
            }
        }

        let map1 = map.clone();
        // t1 is inserting new keys to trigger a bunch of resizes
        let t1 = std::thread::spawn(move || {
            let guard = map1.guard();
            for i in 1024..(1 << 15) {
                map1.insert(i, i, &guard);
            }
        });
        let map2 = map.clone();
        // t2 is retrieving existing keys a lot, attempting to run into a migrating slot
        let t2 = std::thread::spawn(move || {
            let guard = map2.guard();
            for _ in 0..32 {
                for i in 0..1024 {
                    let v = map2.get(&i, &guard).unwrap();
                    assert_eq!(v, &i);
                }
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        // make sure all the entries still exist after all the resizes
        {
            let guard = map.guard();

            for i in 0..(1 << 15) {
                let v = map.get(&i, &guard).unwrap();
                assert_eq!(v, &i);
            }
        }

        assert_eq!(map.len(), 1 << 15);
    });
}

#[test]
fn current_kv_dropped() {
    let dropped1 = Arc::new(0);
    let dropped2 = Arc::new(0);

    with_map::<Arc<usize>, Arc<usize>>(|map| {
        let map = map();
        map.insert(dropped1.clone(), dropped2.clone(), &map.guard());
        assert_eq!(Arc::strong_count(&dropped1), 2);
        assert_eq!(Arc::strong_count(&dropped2), 2);

        drop(map);

        // dropping the map should immediately drop (not deferred) all keys and values
        assert_eq!(Arc::strong_count(&dropped1), 1);
        assert_eq!(Arc::strong_count(&dropped2), 1);
    });
}

#[test]
fn replaced_values_dropped() {
    let value = Arc::new(0);

    with_map::<usize, Arc<usize>>(|map| {
        let map = map();

        for i in 0..256 {
            let guard = map.guard();
            map.insert(i, value.clone(), &guard);
            map.insert(i, value.clone(), &guard);
            map.remove(&i, &guard);
        }

        // resizes clone keys but never values
        for i in 0..256 {
            map.insert(i, value.clone(), &map.guard());
        }

        drop(map);
        assert_eq!(Arc::strong_count(&value), 1);
    });
}

#[test]
fn empty_maps_equal() {
    with_map::<usize, usize>(|map1| {
        with_map::<usize, usize>(|map2| {
            let (map1, map2) = (map1(), map2());
            assert_eq!(map1, map2);
            assert_eq!(map2, map1);
        });
    });
}

#[test]
fn different_size_maps_not_equal() {
    with_map::<usize, usize>(|map1| {
        with_map::<usize, usize>(|map2| {
            let (map1, map2) = (map1(), map2());
            {
                let guard1 = map1.guard();
                let guard2 = map2.guard();

                map1.insert(1, 0, &guard1);
                map1.insert(2, 0, &guard1);
                map1.insert(3, 0, &guard1);

                map2.insert(1, 0, &guard2);
                map2.insert(2, 0, &guard2);
            }

            assert_ne!(map1, map2);
            assert_ne!(map2, map1);
        });
    });
}

#[test]
fn same_values_equal() {
    with_map::<usize, usize>(|map1| {
        with_map::<usize, usize>(|map2| {
            let (map1, map2) = (map1(), map2());
            {
                map1.pin().insert(1, 0);
                map2.pin().insert(1, 0);
            }

            assert_eq!(map1, map2);
            assert_eq!(map2, map1);
        });
    });
}

#[test]
fn different_values_not_equal() {
    with_map::<usize, usize>(|map1| {
        with_map::<usize, usize>(|map2| {
            let (map1, map2) = (map1(), map2());
            {
                map1.pin().insert(1, 0);
                map2.pin().insert(1, 1);
            }

            assert_ne!(map1, map2);
            assert_ne!(map2, map1);
        });
    });
}

#[test]
fn clone_map_empty() {
    with_map::<&'static str, u32>(|map| {
        let map = map();
        let cloned_map = map.clone();
        assert_eq!(map.len(), cloned_map.len());
        assert_eq!(&map, &cloned_map);
        assert_eq!(cloned_map.len(), 0);
    });
}

#[test]
// Test that same values exists in both maps (original and cloned)
fn clone_map_filled() {
    with_map::<&'static str, u32>(|map| {
        let map = map();
        map.insert("FooKey", 0, &map.guard());
        map.insert("BarKey", 10, &map.guard());
        let cloned_map = map.clone();
        assert_eq!(map.len(), cloned_map.len());
        assert_eq!(&map, &cloned_map);

        // test that we are not mapping the same tables
        map.insert("NewItem", 100, &map.guard());
        assert_ne!(&map, &cloned_map);
    });
}

#[test]
fn default() {
    let map: HashMap<usize, usize> = HashMap::default();
    let guard = map.guard();
    map.insert(42, 0, &guard);

    assert_eq!(map.get(&42, &guard), Some(&0));
}

#[test]
fn debug() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        map.insert(42, 0, &guard);
        map.insert(16, 8, &guard);

        let formatted = format!("{:?}", map);

        assert!(formatted == "{42: 0, 16: 8}" || formatted == "{16: 8, 42: 0}");
    });
}

#[test]
fn display() {
    with_map::<&'static str, &'static str>(|map| {
        let map = map();
        assert_eq!(map.to_string(), "{}");

        map.pin().insert("k1", "v1");
        assert_eq!(map.to_string(), "{k1=v1}");

        map.pin().insert("k2", "v2");
        let formatted = map.to_string();
        assert!(formatted == "{k1=v1, k2=v2}" || formatted == "{k2=v2, k1=v1}");
        assert_eq!(map.pin().to_string(), formatted);
    });
}

#[test]
fn extend() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();

        let mut entries: Vec<(usize, usize)> = vec![(42, 0), (16, 6), (38, 42)];
        entries.sort_unstable();

        (&map).extend(entries.clone().into_iter());

        let mut collected: Vec<(usize, usize)> = map
            .iter(&guard)
            .map(|(key, value)| (*key, *value))
            .collect();
        collected.sort_unstable();

        assert_eq!(entries, collected);
    });
}

#[test]
fn extend_ref() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let mut entries: Vec<(&usize, &usize)> = vec![(&42, &0), (&16, &6), (&38, &42)];
        entries.sort();

        (&map).extend(entries.clone().into_iter());

        let guard = map.guard();
        let mut collected: Vec<(&usize, &usize)> = map.iter(&guard).collect();
        collected.sort();

        assert_eq!(entries, collected);
    });
}

#[test]
fn from_iter_empty() {
    use std::iter::FromIterator;

    let entries: Vec<(usize, usize)> = Vec::new();
    let map: HashMap<usize, usize> = HashMap::from_iter(entries.into_iter());

    assert_eq!(map.len(), 0)
}

#[test]
fn len() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let len = if cfg!(miri) { 100 } else { 10_000 };
        for i in 0..len {
            map.pin().insert(i, i + 1);
        }
        assert_eq!(map.pin().len(), len);
    });
}

#[test]
fn iter() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let len = if cfg!(miri) { 100 } else { 10_000 };
        for i in 0..len {
            assert_eq!(map.pin().insert(i, i + 1), None);
        }

        let v: Vec<_> = (0..len).map(|i| (i, i + 1)).collect();
        let mut got: Vec<_> = map.pin().iter().map(|(&k, &v)| (k, v)).collect();
        got.sort();
        assert_eq!(v, got);
    });
}

#[test]
fn keys_and_values() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let guard = map.guard();
        for i in 0..100 {
            map.insert(i, i * 10, &guard);
        }
        for i in 0..50 {
            map.remove(&i, &guard);
        }

        let mut keys: Vec<_> = map.keys(&guard).copied().collect();
        keys.sort();
        assert_eq!(keys, (50..100).collect::<Vec<_>>());

        let mut values: Vec<_> = map.pin().values().copied().collect();
        values.sort();
        assert_eq!(values, (50..100).map(|i| i * 10).collect::<Vec<_>>());

        assert_eq!(map.iter(&guard).count(), map.len());
    });
}

#[test]
fn capacity_grows() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let initial = map.capacity();
        assert!(initial.is_power_of_two());

        // every key stays retrievable across resizes
        for i in 0..10_000 {
            map.pin().insert(i, i);
        }

        let reported = map.capacity();
        assert!(reported > initial);

        // finishing every pending migration settles the entries into one table
        assert_eq!(map.pin().iter().count(), 10_000);
        assert!(map.capacity() >= reported);
        assert!(map.capacity() >= map.len());

        let map = map.pin();
        for i in 0..10_000 {
            assert_eq!(map.get(&i), Some(&i));
        }
    });
}

#[test]
fn full_table_miss() {
    // Hashes every key to itself, so keys `0..len` land in distinct slots.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &byte in bytes {
                self.0 = (self.0 << 8) | u64::from(byte);
            }
        }

        fn write_usize(&mut self, n: usize) {
            self.0 = n as u64;
        }
    }

    let map: HashMap<usize, usize, BuildHasherDefault<IdentityHasher>> = HashMap::builder()
        .hasher(BuildHasherDefault::default())
        .load_factor(1.0)
        .reprobe_limit(64)
        .build();

    let capacity = map.capacity();
    let guard = map.guard();
    for i in 0..capacity {
        assert_eq!(map.insert(i, i, &guard), None);
    }

    // every key cell of the initial table is claimed, and no resize happened
    assert_eq!(map.len(), capacity);
    assert_eq!(map.capacity(), capacity);

    // absent keys walk the whole table and still come back empty
    for key in [capacity, capacity + 1, 2 * capacity - 1, usize::MAX] {
        assert_eq!(map.get(&key, &guard), None);
        assert!(!map.contains_key(&key, &guard));
        assert_eq!(map.remove(&key, &guard), None);
        assert_eq!(map.replace(&key, 0, &guard), None);
    }

    assert_eq!(map.len(), capacity);
    assert_eq!(map.capacity(), capacity);
    for i in 0..capacity {
        assert_eq!(map.get(&i, &guard), Some(&i));
    }
}

#[test]
fn get_through_generic_key() {
    fn lookup<'g, K, V>(map: &HashMap<K, V>, key: &K, guard: &'g impl Guard) -> Option<&'g V>
    where
        K: Hash + Eq + Clone + 'g,
    {
        map.get(key, guard)
    }

    let map = HashMap::new();
    let guard = map.guard();
    map.insert(String::from("a"), 1, &guard);
    assert_eq!(lookup(&map, &String::from("a"), &guard), Some(&1));
    assert_eq!(lookup(&map, &String::from("b"), &guard), None);
}

#[test]
fn mixed() {
    const LEN: usize = if cfg!(miri) { 48 } else { 1024 };
    with_map::<usize, usize>(|map| {
        let map = map();
        assert!(map.pin().get(&100).is_none());
        map.pin().insert(100, 101);
        assert_eq!(map.pin().get(&100), Some(&101));
        map.pin().replace(&100, 103);
        assert_eq!(map.pin().get(&100), Some(&103));

        assert!(map.pin().get(&200).is_none());
        map.pin().insert(200, 202);
        assert_eq!(map.pin().get(&200), Some(&202));

        assert!(map.pin().get(&300).is_none());

        assert_eq!(map.pin().remove(&100), Some(&103));
        assert_eq!(map.pin().remove(&200), Some(&202));
        assert!(map.pin().remove(&300).is_none());

        assert!(map.pin().get(&100).is_none());
        assert!(map.pin().get(&200).is_none());
        assert!(map.pin().get(&300).is_none());

        for i in 0..LEN {
            assert_eq!(map.pin().insert(i, i + 1), None);
        }

        for i in 0..LEN {
            assert_eq!(map.pin().get(&i), Some(&(i + 1)));
        }

        for i in 0..LEN {
            assert_eq!(map.pin().replace(&i, i), Some(&(i + 1)));
        }

        for i in 0..LEN {
            assert_eq!(map.pin().get(&i), Some(&i));
        }

        for i in 0..LEN {
            assert_eq!(map.pin().remove(&i), Some(&i));
        }

        for i in 0..LEN {
            assert_eq!(map.pin().get(&i), None);
        }

        for i in 0..(LEN * 2) {
            assert_eq!(map.pin().insert(i, i + 1), None);
        }

        for i in 0..(LEN * 2) {
            assert_eq!(map.pin().get(&i), Some(&(i + 1)));
        }
    });
}

#[test]
#[should_panic(expected = "Attempted to access map with incorrect guard")]
fn foreign_guard() {
    let map1: HashMap<usize, usize> = HashMap::new();
    let map2: HashMap<usize, usize> = HashMap::new();

    map1.insert(1, 1, &map2.guard());
}

#[test]
fn builder_errors() {
    let err = |result: Result<HashMap<usize, usize>, BuildError>| result.err();

    assert_eq!(
        err(HashMap::builder().load_factor(0.0).try_build()),
        Some(BuildError::LoadFactor(0.0))
    );
    assert_eq!(
        err(HashMap::builder().load_factor(1.5).try_build()),
        Some(BuildError::LoadFactor(1.5))
    );
    assert_eq!(
        err(HashMap::builder().growth_factor(1).try_build()),
        Some(BuildError::GrowthFactor(1))
    );
    assert_eq!(
        err(HashMap::builder().copy_chunk(0).try_build()),
        Some(BuildError::CopyChunk)
    );
    assert_eq!(
        err(HashMap::builder().reprobe_limit(0).try_build()),
        Some(BuildError::ReprobeLimit)
    );
    assert_eq!(
        err(HashMap::builder().capacity(usize::MAX).try_build()),
        Some(BuildError::Capacity(usize::MAX))
    );
    assert!(HashMap::<usize, usize>::builder().load_factor(1.0).try_build().is_ok());
}

#[test]
#[should_panic(expected = "copy chunk must be non-zero")]
fn builder_panics() {
    let _: HashMap<usize, usize> = HashMap::builder().copy_chunk(0).build();
}

// run tests with hashers that create unrealistically long probe sequences
mod hasher {
    use super::*;

    fn check<S: BuildHasher + Default>() {
        let range = if cfg!(miri) { 0..16 } else { 0..100 };

        let configs = [
            HashMap::builder().hasher(S::default()).build(),
            HashMap::builder().hasher(S::default()).copy_chunk(1).build(),
            HashMap::builder()
                .hasher(S::default())
                .reprobe_limit(1)
                .build(),
        ];

        for map in configs {
            let guard = map.guard();
            for i in range.clone() {
                map.insert(i, i, &guard);
            }

            assert!(!map.contains_key(&i32::MIN, &guard));
            assert!(!map.contains_key(&(range.start - 1), &guard));
            for i in range.clone() {
                assert!(map.contains_key(&i, &guard));
            }
            assert!(!map.contains_key(&range.end, &guard));
            assert!(!map.contains_key(&i32::MAX, &guard));

            for i in range.clone().step_by(2) {
                assert_eq!(map.remove(&i, &guard), Some(&i));
            }
            for i in range.clone() {
                assert_eq!(map.contains_key(&i, &guard), i % 2 == 1);
            }
        }
    }

    #[test]
    fn test_zero_hasher() {
        #[derive(Default)]
        pub struct ZeroHasher;

        impl Hasher for ZeroHasher {
            fn finish(&self) -> u64 {
                0
            }

            fn write(&mut self, _: &[u8]) {}
        }

        check::<BuildHasherDefault<ZeroHasher>>();
    }

    #[test]
    fn test_max_hasher() {
        #[derive(Default)]
        struct MaxHasher;

        impl Hasher for MaxHasher {
            fn finish(&self) -> u64 {
                u64::MAX
            }

            fn write(&mut self, _: &[u8]) {}
        }

        check::<BuildHasherDefault<MaxHasher>>();
    }
}
