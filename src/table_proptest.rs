#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can inspect
// chains directly.

use crate::config::TableConfig;
use crate::error::TableError;
use crate::hash::sdbm;
use crate::table::ChainTable;
use crate::value::Ownership;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, Vec<u8>),
    InsertCustom(usize, Vec<u8>),
    Remove(usize),
    Get(usize),
    Contains(Vec<u8>),
}

#[derive(Clone, Debug)]
struct Setup {
    capacity: usize,
    growth_factor: usize,
    load_factor: f64,
    // Hashes are reduced modulo this to force collisions.
    hash_range: u64,
}

fn arb_setup() -> impl Strategy<Value = Setup> {
    (
        1usize..=8,
        2usize..=3,
        prop::sample::select(vec![0.25, 0.7, 1.0, 3.0]),
        prop::sample::select(vec![1u64, 4, 64, u64::MAX]),
    )
        .prop_map(|(capacity, growth_factor, load_factor, hash_range)| Setup {
            capacity,
            growth_factor,
            load_factor,
            hash_range,
        })
}

fn arb_scenario() -> impl Strategy<Value = (Setup, Vec<Vec<u8>>, Vec<OpI>)> {
    let pool = proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..4), 1..=10);
    (arb_setup(), pool).prop_flat_map(|(setup, pool)| {
        let idx = 0..pool.len();
        let value = proptest::collection::vec(any::<u8>(), 0..6);
        let op = prop_oneof![
            (idx.clone(), value.clone()).prop_map(|(i, v)| OpI::Insert(i, v)),
            (idx.clone(), value).prop_map(|(i, v)| OpI::InsertCustom(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.prop_map(OpI::Get),
            proptest::collection::vec(any::<u8>(), 0..4).prop_map(OpI::Contains),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (setup.clone(), pool.clone(), ops))
    })
}

fn check_structure(t: &ChainTable<'_>) -> Result<(), TestCaseError> {
    let mut total = 0;
    for idx in 0..t.capacity() {
        let chain = t.chain_keys(idx);
        for k in &chain {
            prop_assert_eq!(t.bucket_of(k), idx, "entry chained in the wrong bucket");
        }
        total += chain.len();
    }
    prop_assert_eq!(total, t.len(), "len must equal the sum of chain lengths");
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate keys are rejected and never overwrite.
// - `get`/`contains_key` agree with the model for live and absent keys.
// - `remove` reports NotFound exactly when the model lacks the key.
// - Every entry sits in bucket `hash % capacity`; chain lengths sum to `len`.
// - Capacity never shrinks.
// - Custom values are released once per removal and once per survivor on drop.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((setup, pool, ops) in arb_scenario()) {
        let released = Rc::new(Cell::new(0usize));
        let range = setup.hash_range;
        let mut sut = TableConfig::new()
            .capacity(setup.capacity)
            .growth_factor(setup.growth_factor)
            .load_factor(setup.load_factor)
            .hasher(move |k: &[u8]| sdbm(k) % range)
            .build()
            .unwrap();
        let mut model: HashMap<Vec<u8>, (Vec<u8>, bool)> = HashMap::new();
        let mut expected_releases = 0usize;

        for op in ops {
            let cap_before = sut.capacity();
            match op {
                OpI::Insert(i, v) => {
                    let k = &pool[i];
                    let res = sut.insert(k, Ownership::Copy(&v));
                    if model.contains_key(k) {
                        prop_assert_eq!(res, Err(TableError::DuplicateKey));
                    } else {
                        prop_assert!(res.is_ok());
                        model.insert(k.clone(), (v, false));
                    }
                }
                OpI::InsertCustom(i, v) => {
                    let k = &pool[i];
                    let r = released.clone();
                    let res = sut.insert(
                        k,
                        Ownership::custom(v.clone(), move |_| r.set(r.get() + 1)),
                    );
                    if model.contains_key(k) {
                        prop_assert_eq!(res, Err(TableError::DuplicateKey));
                    } else {
                        prop_assert!(res.is_ok());
                        model.insert(k.clone(), (v, true));
                    }
                }
                OpI::Remove(i) => {
                    let k = &pool[i];
                    match model.remove(k) {
                        Some((_, custom)) => {
                            prop_assert_eq!(sut.remove(k), Ok(()));
                            if custom {
                                expected_releases += 1;
                            }
                        }
                        None => {
                            prop_assert_eq!(sut.remove(k), Err(TableError::NotFound));
                        }
                    }
                }
                OpI::Get(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.get(k), model.get(k).map(|(v, _)| v.as_slice()));
                }
                OpI::Contains(k) => {
                    prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
                }
            }
            prop_assert!(sut.capacity() >= cap_before);
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(released.get(), expected_releases);
            check_structure(&sut)?;
        }

        let survivors = model.values().filter(|(_, custom)| *custom).count();
        drop(sut);
        prop_assert_eq!(released.get(), expected_releases + survivors);
    }
}

// Property: chains preserve arrival order. With a single bucket that never
// grows, chain order equals insertion order minus removed keys.
proptest! {
    #[test]
    fn prop_single_chain_order(
        keys in proptest::collection::btree_set(any::<u16>(), 1..40),
        remove_mask in proptest::collection::vec(any::<bool>(), 40),
    ) {
        let mut t = TableConfig::new()
            .capacity(1)
            .load_factor(1000.0)
            .build()
            .unwrap();
        let keys: Vec<[u8; 2]> = keys.into_iter().map(u16::to_le_bytes).collect();
        for k in &keys {
            t.insert(k, Ownership::Copy(b"")).unwrap();
        }
        let mut expected = Vec::new();
        for (k, remove) in keys.iter().zip(remove_mask) {
            if remove {
                t.remove(k).unwrap();
            } else {
                expected.push(&k[..]);
            }
        }
        prop_assert_eq!(t.capacity(), 1);
        prop_assert_eq!(t.chain_keys(0), expected);
    }
}
