//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check layer and multi-layer behaviour over random
//! operation sequences.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CacheEntry, CacheLayer, Clock, DurableCache, EvictionPolicy, ManualClock, MemoryCache,
    MultiLayerCache, SetOptions, DEFAULT_MIN_EXPIRATION_TTL,
};
use crate::stores::InMemoryKvStore;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_DEFAULT_TTL: u64 = 300;
const TAGS: [&str; 3] = ["red", "green", "blue"];

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}"
}

/// Keys from a small pool so operations collide
fn pooled_key_strategy() -> impl Strategy<Value = String> {
    (0u8..12).prop_map(|n| format!("key{n}"))
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,64}".prop_map(Value::from),
        ("[a-z]{1,8}", any::<bool>()).prop_map(|(name, flag)| json!({"name": name, "flag": flag})),
    ]
}

fn tags_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len())
        .prop_map(|tags| tags.into_iter().map(String::from).collect())
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (pooled_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        pooled_key_strategy().prop_map(|key| CacheOp::Get { key }),
        pooled_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn memory(max_entries: usize, policy: EvictionPolicy) -> (MemoryCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (MemoryCache::new(max_entries, policy, clock.clone()), clock)
}

fn entry(clock: &ManualClock, value: Value, ttl: u64) -> CacheEntry<Value> {
    CacheEntry::new(value, ttl, BTreeSet::new(), clock.now_ms()).unwrap()
}

fn two_layer_cache() -> (MultiLayerCache, Arc<MemoryCache>, Arc<DurableCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let memory = Arc::new(MemoryCache::new(
        TEST_MAX_ENTRIES,
        EvictionPolicy::InsertionOrder,
        clock.clone(),
    ));
    let kv = Arc::new(InMemoryKvStore::new(clock.clone()));
    let durable = Arc::new(DurableCache::new(kv, "p:", clock.clone()));
    let layers: Vec<Arc<dyn CacheLayer>> = vec![memory.clone(), durable.clone()];
    let cache = MultiLayerCache::new(layers, clock.clone(), TEST_DEFAULT_TTL);
    (cache, memory, durable, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses match what the caller observed, and the entry count
    // matches the store.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (cache, clock) = memory(TEST_MAX_ENTRIES, EvictionPolicy::InsertionOrder);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.insert(&key, entry(&clock, value, TEST_DEFAULT_TTL)).unwrap();
                }
                CacheOp::Get { key } => match cache.lookup(&key).unwrap() {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.remove(&key).unwrap();
                }
            }
        }

        let stats = cache.get_stats().unwrap();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, cache.len(), "Total entries mismatch");
    }

    // A value written through the multi-layer cache reads back unchanged
    // from every layer before it expires.
    #[test]
    fn prop_roundtrip_through_layers(key in valid_key_strategy(), value in value_strategy()) {
        let (cache, memory, durable, _) = two_layer_cache();

        tokio_test::block_on(async {
            cache.set(&key, &value, SetOptions::new().with_ttl(60)).await.unwrap();

            prop_assert_eq!(cache.get::<Value>(&key).await.unwrap(), Some(value.clone()));
            prop_assert_eq!(memory.get(&key).await.unwrap().map(|e| e.data), Some(value.clone()));
            prop_assert_eq!(durable.get(&key).await.unwrap().map(|e| e.data), Some(value));
            Ok(())
        })?;
    }

    // Once `ttl` seconds have passed, memory and durable layers both report
    // the key absent; one millisecond earlier both still have it.
    #[test]
    fn prop_ttl_expiration_behavior(key in valid_key_strategy(), ttl in 1u64..600) {
        let (cache, memory, durable, clock) = two_layer_cache();

        tokio_test::block_on(async {
            cache.set(&key, &json!("v"), SetOptions::new().with_ttl(ttl)).await.unwrap();

            clock.advance(Duration::from_secs(ttl));
            prop_assert!(memory.has(&key).await.unwrap());
            prop_assert!(durable.has(&key).await.unwrap());

            clock.advance(Duration::from_millis(1));
            prop_assert!(memory.get(&key).await.unwrap().is_none());
            prop_assert!(durable.get(&key).await.unwrap().is_none());
            prop_assert_eq!(cache.get::<Value>(&key).await.unwrap(), None);
            Ok(())
        })?;
    }

    // Deleting twice leaves the same absent state as deleting once.
    #[test]
    fn prop_delete_idempotent(key in valid_key_strategy(), value in value_strategy()) {
        let (cache, _, _, _) = two_layer_cache();

        tokio_test::block_on(async {
            cache.set(&key, &value, SetOptions::new()).await.unwrap();

            prop_assert!(cache.delete(&key).await.unwrap());
            prop_assert_eq!(cache.get::<Value>(&key).await.unwrap(), None);
            prop_assert!(!cache.delete(&key).await.unwrap());
            prop_assert_eq!(cache.get::<Value>(&key).await.unwrap(), None);
            Ok(())
        })?;
    }

    // The memory layer never holds more than its capacity.
    #[test]
    fn prop_capacity_enforcement(
        max_entries in 1usize..20,
        keys in prop::collection::vec(valid_key_strategy(), 1..80),
        lru in any::<bool>()
    ) {
        let policy = if lru { EvictionPolicy::LeastRecentlyUsed } else { EvictionPolicy::InsertionOrder };
        let (cache, clock) = memory(max_entries, policy);

        for key in keys {
            cache.insert(&key, entry(&clock, json!(1), 60)).unwrap();
            prop_assert!(cache.len() <= max_entries);
        }
    }

    // Insertion-order eviction matches a FIFO model regardless of reads.
    #[test]
    fn prop_insertion_order_eviction(
        max_entries in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let (cache, clock) = memory(max_entries, EvictionPolicy::InsertionOrder);
        let mut model: VecDeque<String> = VecDeque::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    if !model.contains(&key) {
                        if model.len() >= max_entries {
                            model.pop_front();
                        }
                        model.push_back(key.clone());
                    }
                    cache.insert(&key, entry(&clock, value, 60)).unwrap();
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.lookup(&key).unwrap().is_some(), model.contains(&key));
                }
                CacheOp::Delete { key } => {
                    model.retain(|k| k != &key);
                    cache.remove(&key).unwrap();
                }
            }
        }

        prop_assert_eq!(cache.len(), model.len());
        for key in &model {
            prop_assert!(cache.contains(key).unwrap());
        }
    }

    // After invalidating a tag, no key carrying it survives and every tag
    // index only names keys that still carry that tag.
    #[test]
    fn prop_durable_tag_index_consistency(
        writes in prop::collection::vec((pooled_key_strategy(), tags_strategy()), 1..30),
        deletes in prop::collection::vec(pooled_key_strategy(), 0..5),
        target in prop::sample::select(TAGS.to_vec())
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(InMemoryKvStore::new(clock.clone()));
        let durable = DurableCache::new(kv, "p:", clock.clone());

        tokio_test::block_on(async {
            let mut current: HashMap<String, BTreeSet<String>> = HashMap::new();
            for (key, tags) in writes {
                let e = CacheEntry::new(json!(1), 60, tags.clone(), clock.now_ms()).unwrap();
                durable.set(&key, e).await.unwrap();
                current.insert(key, tags);
            }
            for key in deletes {
                durable.delete(&key).await.unwrap();
                current.remove(&key);
            }

            let removed: BTreeSet<String> =
                durable.invalidate_by_tag(target).await.unwrap().into_iter().collect();
            let expected: BTreeSet<String> = current
                .iter()
                .filter(|(_, tags)| tags.contains(target))
                .map(|(key, _)| key.clone())
                .collect();
            prop_assert_eq!(&removed, &expected);

            for (key, tags) in &current {
                let present = durable.has(key).await.unwrap();
                prop_assert_eq!(present, !tags.contains(target));
            }

            for tag in TAGS {
                for key in durable.tagged_keys(tag).await.unwrap() {
                    let entry = durable.get(&key).await.unwrap();
                    prop_assert!(entry.is_some_and(|e| e.has_tag(tag)), "stale index entry {} for {}", key, tag);
                }
            }
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Once time passes and expired entries are swept (by reading every key,
    // or by the purge), every tag index member names a live entry carrying
    // that tag.
    #[test]
    fn prop_durable_tag_index_after_expiry(
        writes in prop::collection::vec(
            (pooled_key_strategy(), tags_strategy(), prop::sample::select(vec![5u64, 60, 120, 600])),
            1..30,
        ),
        elapsed_secs in 0u64..700,
        sweep_by_read in any::<bool>(),
        zero_margin in any::<bool>()
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(InMemoryKvStore::new(clock.clone()));
        // Reads can only clean what the provider still holds, so the margin
        // is only dropped when the purge does the sweeping.
        let margin = if zero_margin && !sweep_by_read { 0 } else { DEFAULT_MIN_EXPIRATION_TTL };
        let durable = DurableCache::new(kv, "p:", clock.clone()).with_min_expiration_ttl(margin);

        tokio_test::block_on(async {
            for (key, tags, ttl) in writes {
                let e = CacheEntry::new(json!(1), ttl, tags, clock.now_ms()).unwrap();
                durable.set(&key, e).await.unwrap();
            }

            if sweep_by_read {
                // Stay inside the window where every record still exists
                clock.advance(Duration::from_secs(elapsed_secs % (DEFAULT_MIN_EXPIRATION_TTL + 6)));
                for n in 0u8..12 {
                    durable.get(&format!("key{n}")).await.unwrap();
                }
            } else {
                clock.advance(Duration::from_secs(elapsed_secs));
                durable.purge_expired().await.unwrap();
            }

            for tag in TAGS {
                for key in durable.tagged_keys(tag).await.unwrap() {
                    let entry = durable.get(&key).await.unwrap();
                    prop_assert!(entry.is_some_and(|e| e.has_tag(tag)), "stale index entry {} for {}", key, tag);
                }
            }
            Ok(())
        })?;
    }
}

// == Property Test for Concurrent Operation Correctness ==
// Shared Arc<MemoryCache> hammered from many tasks

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Concurrent reads return either nothing or a complete value that some
    // writer stored, and the capacity bound holds afterwards.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(cache_op_strategy(), 10..60)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let cache = Arc::new(MemoryCache::new(8, EvictionPolicy::LeastRecentlyUsed, clock.clone()));

            let written: BTreeSet<String> = operations
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Set { value, .. } => Some(value.to_string()),
                    _ => None,
                })
                .collect();

            let mut handles = vec![];
            for op in operations {
                let cache = Arc::clone(&cache);
                let clock = Arc::clone(&clock);
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            let e = CacheEntry::new(value, 60, BTreeSet::new(), clock.now_ms()).unwrap();
                            cache.set(&key, e).await.unwrap();
                            None
                        }
                        CacheOp::Get { key } => cache.get(&key).await.unwrap().map(|e| e.data.to_string()),
                        CacheOp::Delete { key } => {
                            cache.delete(&key).await.unwrap();
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                let read = handle.await.expect("Task should not panic");
                if let Some(value) = read {
                    prop_assert!(written.contains(&value), "read a value nobody wrote: {}", value);
                }
            }

            let stats = cache.get_stats().unwrap();
            prop_assert!(stats.total_entries <= 8, "Cache should not exceed max entries");
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate), "Hit rate out of range: {}", hit_rate);
            Ok(())
        })?;
    }
}
