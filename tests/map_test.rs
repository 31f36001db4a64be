/*!
 * Sharded Map Integration Tests
 * Insert-if-absent semantics and cross-shard concurrency
 */

use hcstl::{MapConfig, ShardedMap, WorkloadProfile};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 5_000;

#[test]
fn test_insert_find_erase_cycle() {
    let map = ShardedMap::new();

    assert!(map.insert(7, "seven".to_string()));
    assert_eq!(map.find(&7), Some("seven".to_string()));

    assert!(!map.insert(7, "SEVEN".to_string()));
    assert_eq!(map.find(&7), Some("seven".to_string()));

    assert!(map.erase(&7));
    assert_eq!(map.find(&7), None);
    assert!(map.is_empty());
}

#[test]
fn test_disjoint_ranges_concurrently() {
    let map = Arc::new(ShardedMap::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = map.clone();
            thread::spawn(move || {
                for j in 0..KEYS_PER_THREAD {
                    let key = t * KEYS_PER_THREAD + j;
                    assert!(map.insert(key, key * 2));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(map.len(), THREADS * KEYS_PER_THREAD);
    for key in 0..THREADS * KEYS_PER_THREAD {
        assert_eq!(map.find(&key), Some(key * 2));
    }
}

#[test]
fn test_concurrent_readers_and_writers() {
    let config = MapConfig::for_profile(WorkloadProfile::HighContention);
    let map = Arc::new(ShardedMap::with_config(config).unwrap());
    for key in 0..1_000u64 {
        map.insert(key, key);
    }

    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let map = map.clone();
            thread::spawn(move || {
                for key in 0..1_000u64 {
                    let key = 1_000 + t * 1_000 + key;
                    map.insert(key, key);
                    assert!(map.erase(&key));
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let map = map.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    for key in 0..1_000u64 {
                        assert_eq!(map.find(&key), Some(key));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(map.len(), 1_000);
    assert_eq!(map.stats().shard_total(), 1_000);
}

#[test]
fn test_random_mixed_workload_counts_agree() {
    let map = Arc::new(ShardedMap::with_shards(16).unwrap());

    let handles: Vec<_> = (0..THREADS as u64)
        .map(|seed| {
            let map = map.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut net: i64 = 0;
                for _ in 0..20_000 {
                    let key: u32 = rng.gen_range(0..512);
                    if rng.gen_bool(0.5) {
                        if map.insert(key, seed) {
                            net += 1;
                        }
                    } else if map.erase(&key) {
                        net -= 1;
                    }
                }
                net
            })
        })
        .collect();

    let net: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(map.len() as i64, net);
    assert_eq!(map.stats().shard_total(), map.len());
    let present = (0..512u32).filter(|k| map.contains_key(k)).count();
    assert_eq!(present, map.len());
}

#[test]
fn test_clear_then_reuse() {
    let map = ShardedMap::new();
    for key in 0..10_000 {
        map.insert(key, ());
    }
    assert_eq!(map.len(), 10_000);

    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.find(&42), None);

    assert!(map.insert(42, ()));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_clear_races_writers() {
    for _ in 0..20 {
        let map = Arc::new(ShardedMap::with_shards(8).unwrap());

        let writers: Vec<_> = (0..4u32)
            .map(|t| {
                let map = map.clone();
                thread::spawn(move || {
                    for key in 0..2_000u32 {
                        let key = t * 2_000 + key;
                        map.insert(key, key);
                        if key % 3 == 0 {
                            map.erase(&key);
                        }
                    }
                })
            })
            .collect();

        let clearer = {
            let map = map.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    map.clear();
                    thread::yield_now();
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        clearer.join().unwrap();

        // Entries inserted into an already-cleared shard stay counted
        let stats = map.stats();
        assert_eq!(map.len(), stats.shard_total());
        let present = (0..8_000u32).filter(|k| map.contains_key(k)).count();
        assert_eq!(present, map.len());
    }
}
