// seektable property tests.
//
// Property 1: table state matches a reference map under a random stream
// of seek/write, delete, lookup, and enumeration operations driven
// through a long-lived cursor.
//  - Model: std HashMap<key, payload byte>.
//  - Invariants: len parity after every step; lookup parity; a full
//    enumeration through a second cursor visits exactly the model keys;
//    finalize fires once per removal and once per survivor at drop.
//
// Property 2: deferred release under two cursors. Deletions through one
// cursor while another stays open park storage on the deferred list;
// after both close, the table agrees with the model and all deferred
// storage is gone.
use proptest::prelude::*;
use seektable::{Config, SeekOutcome, Table};
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

fn key_bytes(i: usize) -> Vec<u8> {
    format!("key-{i}").into_bytes()
}

fn counting_config(counter: &Rc<Cell<usize>>) -> Config {
    let c = Rc::clone(counter);
    Config {
        finalize: Some(Box::new(move |_f| c.set(c.get() + 1))),
        ..Config::default()
    }
}

proptest! {
    #[test]
    fn prop_table_matches_reference_map(
        keys in 1usize..=8,
        ops in proptest::collection::vec((0u8..=3u8, 0usize..100usize, any::<u8>()), 1..200),
    ) {
        let finalized = Rc::new(Cell::new(0usize));
        let mut t = Table::with_config(1, counting_config(&finalized));
        let mut model: HashMap<Vec<u8>, u8> = HashMap::new();
        let mut removals = 0usize;

        let mut cur = t.open();
        for (op, raw_k, val) in ops {
            let key = key_bytes(raw_k % keys);
            match op {
                // Seek and (over)write the payload.
                0 => {
                    let outcome = cur.seek(&mut t, &key, b"\0").unwrap();
                    let expected = if model.contains_key(&key) {
                        SeekOutcome::Existing
                    } else {
                        SeekOutcome::Inserted
                    };
                    prop_assert_eq!(outcome, expected);
                    cur.payload_mut(&mut t).unwrap()[0] = val;
                    model.insert(key.clone(), val);
                }
                // Delete when present; the sole cursor frees immediately.
                1 => {
                    if model.remove(&key).is_some() {
                        prop_assert_eq!(
                            cur.seek(&mut t, &key, b"\0").unwrap(),
                            SeekOutcome::Existing
                        );
                        cur.delete(&mut t).unwrap();
                        removals += 1;
                    } else {
                        prop_assert!(t.lookup(&key).is_none());
                    }
                }
                // Lookup parity.
                2 => {
                    prop_assert_eq!(
                        t.lookup(&key).map(|p| p[0]),
                        model.get(&key).copied()
                    );
                }
                // Enumeration parity through a nested cursor.
                3 => {
                    let mut walker = t.open();
                    let mut seen = BTreeSet::new();
                    while let Some(k) = walker.key(&t).map(<[u8]>::to_vec) {
                        prop_assert!(seen.insert(k), "entry visited twice");
                        if !walker.advance(&t) {
                            break;
                        }
                    }
                    walker.close(&mut t).unwrap();
                    let expected: BTreeSet<Vec<u8>> = model.keys().cloned().collect();
                    prop_assert_eq!(seen, expected);
                }
                _ => unreachable!(),
            }

            prop_assert_eq!(t.len(), model.len());
            prop_assert_eq!(finalized.get(), removals);
        }
        cur.close(&mut t).unwrap();

        // Drop finalizes each survivor exactly once.
        let survivors = model.len();
        drop(t);
        prop_assert_eq!(finalized.get(), removals + survivors);
    }
}

proptest! {
    #[test]
    fn prop_deferred_release_under_two_cursors(
        keys in 2usize..=6,
        ops in proptest::collection::vec((0u8..=1u8, 0usize..64usize), 1..100),
    ) {
        let finalized = Rc::new(Cell::new(0usize));
        let mut t = Table::with_config(0, counting_config(&finalized));
        let mut model: BTreeSet<Vec<u8>> = BTreeSet::new();
        let mut removals = 0usize;

        // Seed the table, then keep a bystander cursor open for the whole
        // run so every delete takes the deferred path.
        let mut seeder = t.open();
        for i in 0..keys {
            seeder.seek(&mut t, &key_bytes(i), b"").unwrap();
            model.insert(key_bytes(i));
        }
        seeder.close(&mut t).unwrap();

        let mut bystander = t.open();
        let mut worker = t.open();
        for (op, raw_k) in ops {
            let key = key_bytes(raw_k % keys);
            match op {
                0 => {
                    if model.insert(key.clone()) {
                        prop_assert_eq!(
                            worker.seek(&mut t, &key, b"").unwrap(),
                            SeekOutcome::Inserted
                        );
                    } else {
                        prop_assert_eq!(
                            worker.seek(&mut t, &key, b"").unwrap(),
                            SeekOutcome::Existing
                        );
                    }
                }
                1 => {
                    if model.remove(&key) {
                        worker.seek(&mut t, &key, b"").unwrap();
                        worker.delete(&mut t).unwrap();
                        removals += 1;
                    }
                }
                _ => unreachable!(),
            }
            prop_assert_eq!(t.len(), model.len());
            // Finalize happens at delete time even though release waits.
            prop_assert_eq!(finalized.get(), removals);
        }

        worker.close(&mut t).unwrap();
        bystander.close(&mut t).unwrap();

        // After the last close the table agrees with the model and the
        // deferred storage is gone; no additional finalize calls ran.
        prop_assert_eq!(t.len(), model.len());
        prop_assert_eq!(finalized.get(), removals);
        for key in &model {
            prop_assert!(t.lookup(key).is_some());
        }
    }
}
