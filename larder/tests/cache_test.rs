//  Copyright 2025 Larder Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use larder::{
    Cache, CacheBuilder, EvictionConfig, FifoConfig, LruConfig, S3FifoConfig, SieveConfig,
    TinyLfuConfig, TtlEnabled,
};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

fn unsharded(capacity: usize, config: impl Into<EvictionConfig>) -> Cache<u64, u64> {
    CacheBuilder::new(capacity)
        .with_shards(1)
        .with_eviction_config(config)
        .build()
        .unwrap()
}

fn all_policies() -> Vec<EvictionConfig> {
    vec![
        FifoConfig::default().into(),
        LruConfig::default().into(),
        SieveConfig::default().into(),
        S3FifoConfig::default().into(),
        TinyLfuConfig::default().into(),
    ]
}

#[test_log::test]
fn test_fifo_boundary() {
    let cache = unsharded(3, FifoConfig::default());
    for key in 1..=5 {
        cache.put(key, key);
    }
    for key in 1..=2 {
        assert!(!cache.contains(&key));
    }
    for key in 3..=5 {
        assert_eq!(cache.get(&key), Some(key));
    }
    assert_eq!(cache.len(), 3);
}

#[test_log::test]
fn test_lru_boundary() {
    let cache = unsharded(4, LruConfig::default());
    for key in 1..=4 {
        cache.put(key, key);
    }
    cache.get(&1);
    cache.get(&3);

    cache.put(5, 5);
    assert!(!cache.contains(&2));

    cache.put(6, 6);
    assert!(!cache.contains(&4));

    for key in [1, 3, 5, 6] {
        assert!(cache.contains(&key));
    }
}

#[test_log::test]
fn test_sieve_boundary() {
    let cache = unsharded(3, SieveConfig::default());
    for key in 1..=3 {
        cache.put(key, key);
    }
    cache.get(&1);
    cache.get(&3);

    cache.put(4, 4);
    assert!(!cache.contains(&2));
    for key in [1, 3, 4] {
        assert!(cache.contains(&key));
    }
}

#[test_log::test]
fn test_s3fifo_boundary() {
    let cache = unsharded(5, S3FifoConfig::default());
    for key in 1..=5 {
        cache.put(key, key);
    }
    for key in 1..=4 {
        assert_eq!(cache.get(&key), Some(key));
    }
    cache.put(6, 6);

    // The oldest zero-frequency path leads to key 1.
    assert!(!cache.contains(&1));
    assert_eq!(cache.get(&1), None);
    for key in 2..=4 {
        assert_eq!(cache.get(&key), Some(key));
    }
    assert_eq!(cache.get(&6), Some(6));
    // Key 5 was never accessed: its key is parked for admission decisions
    // but its value is gone.
    assert!(!cache.contains(&5));
    assert_eq!(cache.get(&5), None);
}

#[test_log::test]
fn test_tinylfu_boundary() {
    let cache = unsharded(5, TinyLfuConfig::default());
    cache.put(1, 1);
    cache.put(2, 2);
    cache.get(&1);
    cache.put(3, 3);
    cache.get(&2);
    cache.put(4, 4);
    cache.get(&3);
    cache.put(5, 5);
    for _ in 0..3 {
        cache.get(&4);
    }
    cache.put(6, 6);

    // Key 5's sketched frequency loses the admission duel.
    assert!(!cache.contains(&5));
    for key in [1, 2, 3, 4, 6] {
        assert!(cache.contains(&key));
    }
    assert_eq!(cache.len(), 5);
}

#[test]
fn test_size_one_cache_retains_exactly_one() {
    // S3-FIFO and W-TinyLFU are excluded: their sizing formulas put a floor
    // of one ghost slot and two main slots respectively under the single
    // entry, so a size-one instance retains more than one resident.
    let policies: Vec<EvictionConfig> = vec![
        FifoConfig::default().into(),
        LruConfig::default().into(),
        SieveConfig::default().into(),
    ];
    for config in policies {
        let cache = unsharded(1, config.clone());
        for key in 1..=4 {
            cache.put(key, key);
        }
        assert_eq!(cache.len(), 1, "{config:?}");
        assert!(cache.contains(&4), "{config:?}");
    }
}

#[test]
fn test_contains_matches_get() {
    for config in all_policies() {
        let cache = unsharded(16, config.clone());
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let key = rng.next_u64() % 64;
            match rng.gen_range(0..3) {
                0 => cache.put(key, key),
                1 => {
                    cache.remove(&key);
                }
                _ => {
                    assert_eq!(
                        cache.contains(&key),
                        cache.get(&key).is_some(),
                        "{config:?}"
                    );
                }
            }
            assert!(cache.len() <= 16, "{config:?}");
        }
    }
}

#[test]
fn test_ttl_expiry() {
    for config in all_policies() {
        let cache: Cache<u64, u64, TtlEnabled> = CacheBuilder::new(8)
            .with_shards(1)
            .with_ttl()
            .with_eviction_config(config.clone())
            .build()
            .unwrap();

        cache.put_with_ttl(1, 1, Duration::from_millis(5));
        cache.put_with_ttl(2, 2, Duration::from_millis(60_000));
        cache.put(3, 3);

        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get(&1), None, "{config:?}");
        // The expired entry is dropped by the lookup itself.
        assert_eq!(cache.len(), 2, "{config:?}");
        assert_eq!(cache.get(&2), Some(2), "{config:?}");
        // Entries inserted without a TTL never expire.
        assert_eq!(cache.get(&3), Some(3), "{config:?}");
    }
}

#[test]
fn test_concurrent_smoke() {
    for config in all_policies() {
        let cache = Arc::new(
            CacheBuilder::<u64, u64>::new(128)
                .with_shards(8)
                .with_eviction_config(config.clone())
                .build()
                .unwrap(),
        );

        std::thread::scope(|scope| {
            for worker in 0..4u64 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(worker);
                    for _ in 0..20_000 {
                        let key = rng.next_u64() % 512;
                        if cache.get(&key).is_none() {
                            cache.put(key, key);
                        }
                        if rng.gen_ratio(1, 16) {
                            cache.remove(&key);
                        }
                    }
                });
            }
        });

        assert!(cache.len() <= 128, "{config:?}");
    }
}

#[test]
fn test_single_thread_mode() {
    let cache = CacheBuilder::<u64, String>::new(8)
        .single_thread()
        .with_eviction_config(S3FifoConfig::default())
        .build()
        .unwrap();
    cache.put(1, "jam".to_string());
    assert_eq!(cache.get(&1), Some("jam".to_string()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_custom_hasher_and_pool_capacity() {
    let cache = CacheBuilder::<String, u64>::new(32)
        .with_shards(2)
        .with_pool_capacity(8)
        .with_hash_builder(ahash::RandomState::with_seeds(1, 2, 3, 4))
        .with_eviction_config(LruConfig::default())
        .build()
        .unwrap();

    // Under-provisioned pools fall back to on-demand allocation.
    for key in 0..32u64 {
        cache.put(format!("key-{key}"), key);
    }
    assert_eq!(cache.len(), 32);
    assert_eq!(cache.get(&"key-31".to_string()), Some(31));
}
