//! Concurrency tests for the B+ tree index: crab-latched readers and writers
//! sharing one tree over one buffer pool.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use quarry::buffer::BufferPoolManager;
use quarry::common::{PageId, RecordId};
use quarry::index::{BPlusTree8, GenericComparator, GenericKey};
use quarry::storage::disk::DiskManager;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

type Key = GenericKey<8>;

const KEY_SPACE: i64 = 10_000;

fn key(v: i64) -> Key {
    Key::from_i64(v)
}

fn rid(v: i64) -> RecordId {
    RecordId::from_i64(v)
}

fn create_tree(pool_size: usize) -> (Arc<BPlusTree8>, Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
    let tree = Arc::new(
        BPlusTree8::new(
            "concurrent_index",
            Arc::clone(&bpm),
            GenericComparator::<8>,
            16,
            16,
        )
        .unwrap(),
    );
    (tree, bpm, temp_file)
}

fn assert_all_unpinned(bpm: &BufferPoolManager) {
    for pid in 0..bpm.disk_manager().get_num_pages() {
        if let Some(count) = bpm.get_pin_count(PageId::new(pid)) {
            assert_eq!(count, 0, "page {} still pinned", pid);
        }
    }
}

#[test]
fn test_concurrent_inserts_disjoint_ranges() {
    let (tree, bpm, _temp) = create_tree(256);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for k in (t * 1000)..(t * 1000 + 1000) {
                    assert!(tree.insert(&key(k), rid(k)).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for k in 0..4000 {
        assert_eq!(tree.get_value(&key(k)).unwrap(), Some(rid(k)));
    }

    // In-order traversal sees every key exactly once
    let collected: Vec<i64> = tree
        .iter()
        .unwrap()
        .map(|entry| entry.unwrap().0.to_i64())
        .collect();
    assert_eq!(collected, (0..4000).collect::<Vec<i64>>());

    assert_all_unpinned(&bpm);
}

#[test]
fn test_concurrent_readers_with_one_writer() {
    let (tree, bpm, _temp) = create_tree(256);

    // Preload the full key space
    for k in 1..=KEY_SPACE {
        tree.insert(&key(k), rid(k)).unwrap();
    }

    let readers: Vec<_> = (0..8)
        .map(|seed| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..2000 {
                    let k = rng.gen_range(1..=KEY_SPACE);
                    // A concurrent writer may have removed the key, but a
                    // present key always carries its own RID
                    if let Some(found) = tree.get_value(&key(k)).unwrap() {
                        assert_eq!(found, rid(k));
                    }
                }
            })
        })
        .collect();

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(42);
            let mut expected: HashSet<i64> = (1..=KEY_SPACE).collect();
            for _ in 0..2000 {
                let k = rng.gen_range(1..=KEY_SPACE);
                if expected.contains(&k) {
                    tree.remove(&key(k)).unwrap();
                    expected.remove(&k);
                } else {
                    assert!(tree.insert(&key(k), rid(k)).unwrap());
                    expected.insert(k);
                }
            }
            expected
        })
    };

    for handle in readers {
        handle.join().unwrap();
    }
    let expected = writer.join().unwrap();

    // The final key set matches the writer's log
    for k in 1..=KEY_SPACE {
        let found = tree.get_value(&key(k)).unwrap();
        if expected.contains(&k) {
            assert_eq!(found, Some(rid(k)), "key {} lost", k);
        } else {
            assert_eq!(found, None, "key {} resurrected", k);
        }
    }

    assert_all_unpinned(&bpm);
}

#[test]
fn test_concurrent_writers_interleaved_keys() {
    let (tree, bpm, _temp) = create_tree(256);

    // Each writer owns keys congruent to its id mod 4; half get removed again
    let handles: Vec<_> = (0..4i64)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for k in (0..2000).map(|i| i * 4 + t) {
                    assert!(tree.insert(&key(k), rid(k)).unwrap());
                }
                for k in (0..2000).filter(|i| i % 2 == 0).map(|i| i * 4 + t) {
                    tree.remove(&key(k)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4i64 {
        for i in 0..2000i64 {
            let k = i * 4 + t;
            let found = tree.get_value(&key(k)).unwrap();
            if i % 2 == 0 {
                assert_eq!(found, None);
            } else {
                assert_eq!(found, Some(rid(k)));
            }
        }
    }

    assert_all_unpinned(&bpm);
}
