#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::hash_map::Entry;

use arbitrary::Arbitrary;
use nbhm::HashMap as NbHashMap;
use std::collections::HashMap as StdHashMap;

#[derive(Debug, Arbitrary)]
enum Operation<K, V> {
    Insert(K, V),
    InsertIfAbsent(K, V),
    Replace(K, V),
    CompareAndReplace(K, V, V),
    Remove(K),
    CompareAndRemove(K, V),
    Get(K),
    Contains(K),
    ContainsValue(V),
    Clear,
    Len,
    IsEmpty,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    small_table: bool,
    operations: Vec<Operation<u8, u32>>,
}

fn fuzz_hashmap(input: FuzzInput) {
    let mut std_map = StdHashMap::new();
    let nb_raw = if input.small_table {
        NbHashMap::builder().reprobe_limit(1).copy_chunk(1).build()
    } else {
        NbHashMap::new()
    };
    let nb_map = nb_raw.pin();

    for op in input.operations {
        match op {
            Operation::Insert(k, v) => {
                let std_result = std_map.insert(k, v);
                let nb_result = nb_map.insert(k, v);
                assert_eq!(std_result.as_ref(), nb_result);
            }
            Operation::InsertIfAbsent(k, v) => {
                let std_result = match std_map.entry(k) {
                    Entry::Occupied(entry) => Some(*entry.get()),
                    Entry::Vacant(entry) => {
                        entry.insert(v);
                        None
                    }
                };
                let nb_result = nb_map.insert_if_absent(k, v);
                assert_eq!(std_result.as_ref(), nb_result);
            }
            Operation::Replace(k, v) => {
                let std_result = std_map.get_mut(&k).map(|e| std::mem::replace(e, v));
                let nb_result = nb_map.replace(&k, v);
                assert_eq!(std_result.as_ref(), nb_result);
            }
            Operation::CompareAndReplace(k, current, v) => {
                let std_result = match std_map.get_mut(&k) {
                    Some(e) if *e == current => {
                        *e = v;
                        true
                    }
                    _ => false,
                };
                let nb_result = nb_map.compare_and_replace(&k, &current, v);
                assert_eq!(std_result, nb_result);
            }
            Operation::Remove(k) => {
                let std_result = std_map.remove(&k);
                let nb_result = nb_map.remove(&k);
                assert_eq!(std_result.as_ref(), nb_result);
            }
            Operation::CompareAndRemove(k, current) => {
                let std_result = match std_map.entry(k) {
                    Entry::Occupied(entry) if *entry.get() == current => {
                        entry.remove();
                        true
                    }
                    _ => false,
                };
                let nb_result = nb_map.compare_and_remove(&k, &current);
                assert_eq!(std_result, nb_result);
            }
            Operation::Get(k) => {
                let std_result = std_map.get(&k);
                let nb_result = nb_map.get(&k);
                assert_eq!(std_result, nb_result);
            }
            Operation::Contains(k) => {
                assert_eq!(std_map.contains_key(&k), nb_map.contains_key(&k));
            }
            Operation::ContainsValue(v) => {
                let std_result = std_map.values().any(|e| *e == v);
                assert_eq!(std_result, nb_map.contains_value(&v));
            }
            Operation::Clear => {
                std_map.clear();
                nb_map.clear();
            }
            Operation::Len => {
                assert_eq!(std_map.len(), nb_map.len());
            }
            Operation::IsEmpty => {
                assert_eq!(std_map.is_empty(), nb_map.is_empty());
            }
        }
    }

    // Final consistency checks
    for (k, v) in std_map.iter() {
        assert_eq!(Some(v), nb_map.get(k));
    }
    assert_eq!(std_map.len(), nb_map.len());
    assert_eq!(std_map.len(), nb_map.iter().count());
}

fuzz_target!(|data: FuzzInput| {
    fuzz_hashmap(data);
});
