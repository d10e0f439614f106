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

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use larder_common::code::{HashBuilder, Key, Value};
use larder_common::hash::{hash_one, DefaultHashBuilder};
use larder_common::sync::{MultiThread, ShardLock, SingleThread, ThreadModel};
use larder_common::ttl::{now_millis, TtlDisabled, TtlEnabled, TtlMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::eviction::fifo::{Fifo, FifoConfig};
use crate::eviction::lru::{Lru, LruConfig};
use crate::eviction::s3fifo::{S3Fifo, S3FifoConfig};
use crate::eviction::sieve::{Sieve, SieveConfig};
use crate::eviction::tinylfu::{TinyLfu, TinyLfuConfig};
use crate::eviction::Eviction;
use crate::metrics::Metrics;

/// Runtime-selected eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EvictionConfig {
    Fifo(FifoConfig),
    Lru(LruConfig),
    Sieve(SieveConfig),
    S3Fifo(S3FifoConfig),
    TinyLfu(TinyLfuConfig),
}

impl From<FifoConfig> for EvictionConfig {
    fn from(config: FifoConfig) -> Self {
        Self::Fifo(config)
    }
}

impl From<LruConfig> for EvictionConfig {
    fn from(config: LruConfig) -> Self {
        Self::Lru(config)
    }
}

impl From<SieveConfig> for EvictionConfig {
    fn from(config: SieveConfig) -> Self {
        Self::Sieve(config)
    }
}

impl From<S3FifoConfig> for EvictionConfig {
    fn from(config: S3FifoConfig) -> Self {
        Self::S3Fifo(config)
    }
}

impl From<TinyLfuConfig> for EvictionConfig {
    fn from(config: TinyLfuConfig) -> Self {
        Self::TinyLfu(config)
    }
}

/// One shard: a policy instance selected at runtime.
///
/// Static dispatch by match; trait objects are deliberately avoided on this
/// path.
enum Shard<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    Fifo(Fifo<K, V, T>),
    Lru(Lru<K, V, T>),
    Sieve(Sieve<K, V, T>),
    S3Fifo(S3Fifo<K, V, T>),
    TinyLfu(TinyLfu<K, V, T>),
}

impl<K, V, T> Shard<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    fn new(
        capacity: usize,
        pool_capacity: usize,
        max_load_percentage: u8,
        config: &EvictionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        match config {
            EvictionConfig::Fifo(config) => Self::Fifo(Fifo::new(
                capacity,
                pool_capacity,
                max_load_percentage,
                config,
                metrics,
            )),
            EvictionConfig::Lru(config) => Self::Lru(Lru::new(
                capacity,
                pool_capacity,
                max_load_percentage,
                config,
                metrics,
            )),
            EvictionConfig::Sieve(config) => Self::Sieve(Sieve::new(
                capacity,
                pool_capacity,
                max_load_percentage,
                config,
                metrics,
            )),
            EvictionConfig::S3Fifo(config) => Self::S3Fifo(S3Fifo::new(
                capacity,
                pool_capacity,
                max_load_percentage,
                config,
                metrics,
            )),
            EvictionConfig::TinyLfu(config) => Self::TinyLfu(TinyLfu::new(
                capacity,
                pool_capacity,
                max_load_percentage,
                config,
                metrics,
            )),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo(shard) => shard.len(),
            Self::Lru(shard) => shard.len(),
            Self::Sieve(shard) => shard.len(),
            Self::S3Fifo(shard) => shard.len(),
            Self::TinyLfu(shard) => shard.len(),
        }
    }

    fn contains(&self, hash: u64, key: &K) -> bool {
        match self {
            Self::Fifo(shard) => shard.contains(hash, key),
            Self::Lru(shard) => shard.contains(hash, key),
            Self::Sieve(shard) => shard.contains(hash, key),
            Self::S3Fifo(shard) => shard.contains(hash, key),
            Self::TinyLfu(shard) => shard.contains(hash, key),
        }
    }

    fn get(&mut self, hash: u64, key: &K) -> Option<V> {
        match self {
            Self::Fifo(shard) => shard.get(hash, key),
            Self::Lru(shard) => shard.get(hash, key),
            Self::Sieve(shard) => shard.get(hash, key),
            Self::S3Fifo(shard) => shard.get(hash, key),
            Self::TinyLfu(shard) => shard.get(hash, key),
        }
    }

    fn put(&mut self, hash: u64, key: K, value: V, expiry: T::Expiry) -> bool {
        match self {
            Self::Fifo(shard) => shard.put(hash, key, value, expiry),
            Self::Lru(shard) => shard.put(hash, key, value, expiry),
            Self::Sieve(shard) => shard.put(hash, key, value, expiry),
            Self::S3Fifo(shard) => shard.put(hash, key, value, expiry),
            Self::TinyLfu(shard) => shard.put(hash, key, value, expiry),
        }
    }

    fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self {
            Self::Fifo(shard) => shard.remove(hash, key),
            Self::Lru(shard) => shard.remove(hash, key),
            Self::Sieve(shard) => shard.remove(hash, key),
            Self::S3Fifo(shard) => shard.remove(hash, key),
            Self::TinyLfu(shard) => shard.remove(hash, key),
        }
    }
}

/// Builder for [`Cache`].
///
/// TTL support and the threading model are type-level switches flipped by
/// [`with_ttl`](Self::with_ttl) and [`single_thread`](Self::single_thread);
/// sizes and the eviction policy are runtime values.
pub struct CacheBuilder<K, V, T = TtlDisabled, M = MultiThread, S = DefaultHashBuilder>
where
    K: Key,
    V: Value,
    T: TtlMode,
    M: ThreadModel,
    S: HashBuilder,
{
    capacity: usize,
    shards: usize,
    pool_capacity: Option<usize>,
    max_load_percentage: u8,
    eviction_config: EvictionConfig,
    hash_builder: S,
    _marker: PhantomData<(fn() -> (K, V), T, M)>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Starts a builder for a cache holding up to `capacity` entries, with
    /// LRU eviction, 8 shards and TTL disabled.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            shards: 8,
            pool_capacity: None,
            max_load_percentage: 60,
            eviction_config: EvictionConfig::Lru(LruConfig::default()),
            hash_builder: DefaultHashBuilder::default(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, T, M, S> CacheBuilder<K, V, T, M, S>
where
    K: Key,
    V: Value,
    T: TtlMode,
    M: ThreadModel,
    S: HashBuilder,
{
    /// Shard count; rounded up to the next power of two.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Preallocated node pool size. Defaults to the capacity.
    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = Some(pool_capacity);
        self
    }

    /// Load factor bound of the hash index, in percent.
    pub fn with_max_load_percentage(mut self, max_load_percentage: u8) -> Self {
        self.max_load_percentage = max_load_percentage;
        self
    }

    pub fn with_eviction_config(mut self, eviction_config: impl Into<EvictionConfig>) -> Self {
        self.eviction_config = eviction_config.into();
        self
    }

    /// Enables per-entry TTL, which makes `put_with_ttl` available and adds
    /// expiry storage to every node.
    pub fn with_ttl(self) -> CacheBuilder<K, V, TtlEnabled, M, S> {
        CacheBuilder {
            capacity: self.capacity,
            shards: self.shards,
            pool_capacity: self.pool_capacity,
            max_load_percentage: self.max_load_percentage,
            eviction_config: self.eviction_config,
            hash_builder: self.hash_builder,
            _marker: PhantomData,
        }
    }

    /// Drops the shard locks; the cache becomes `!Sync`.
    pub fn single_thread(self) -> CacheBuilder<K, V, T, SingleThread, S> {
        CacheBuilder {
            capacity: self.capacity,
            shards: self.shards,
            pool_capacity: self.pool_capacity,
            max_load_percentage: self.max_load_percentage,
            eviction_config: self.eviction_config,
            hash_builder: self.hash_builder,
            _marker: PhantomData,
        }
    }

    pub fn with_hash_builder<S2>(self, hash_builder: S2) -> CacheBuilder<K, V, T, M, S2>
    where
        S2: HashBuilder,
    {
        CacheBuilder {
            capacity: self.capacity,
            shards: self.shards,
            pool_capacity: self.pool_capacity,
            max_load_percentage: self.max_load_percentage,
            eviction_config: self.eviction_config,
            hash_builder,
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Result<Cache<K, V, T, M, S>> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if self.shards == 0 {
            return Err(Error::ZeroShards);
        }
        if self.max_load_percentage == 0 || self.max_load_percentage > 100 {
            return Err(Error::InvalidMaxLoad(self.max_load_percentage));
        }
        match &self.eviction_config {
            EvictionConfig::S3Fifo(config) => {
                if config.small_size_percent == 0 || config.small_size_percent > 100 {
                    return Err(Error::InvalidPercent {
                        name: "small_size_percent",
                        value: config.small_size_percent,
                    });
                }
            }
            EvictionConfig::TinyLfu(config) => {
                if config.cms_depth == 0 {
                    return Err(Error::ZeroSketchDepth);
                }
                if config.window_size_percent == 0 || config.window_size_percent > 100 {
                    return Err(Error::InvalidPercent {
                        name: "window_size_percent",
                        value: config.window_size_percent,
                    });
                }
            }
            _ => {}
        }

        let shard_count = self.shards.next_power_of_two();
        let shard_capacity = (self.capacity / shard_count).max(1);
        let shard_pool_capacity = self.pool_capacity.unwrap_or(self.capacity) / shard_count + 1;

        debug!(
            capacity = self.capacity,
            shard_count,
            shard_capacity,
            eviction_config = ?self.eviction_config,
            "building cache"
        );

        let metrics = Arc::new(Metrics::default());
        let shards: Vec<M::Lock<Shard<K, V, T>>> = (0..shard_count)
            .map(|_| {
                ShardLock::new(Shard::new(
                    shard_capacity,
                    shard_pool_capacity,
                    self.max_load_percentage,
                    &self.eviction_config,
                    metrics.clone(),
                ))
            })
            .collect_vec();

        Ok(Cache {
            shards,
            shard_mask: shard_count as u64 - 1,
            capacity: self.capacity,
            hash_builder: self.hash_builder,
            metrics,
        })
    }
}

/// Sharded in-memory cache.
///
/// The key hash routes to a shard via the low bits; operations on distinct
/// shards proceed in parallel, and no operation ever takes more than one
/// shard lock. `contains` and `len` take shared locks; `get`, `put` and
/// `remove` take the exclusive lock because even lookups update
/// recency/frequency metadata and may drop expired entries.
pub struct Cache<K, V, T = TtlDisabled, M = MultiThread, S = DefaultHashBuilder>
where
    K: Key,
    V: Value,
    T: TtlMode,
    M: ThreadModel,
    S: HashBuilder,
{
    shards: Vec<M::Lock<Shard<K, V, T>>>,
    shard_mask: u64,
    capacity: usize,
    hash_builder: S,
    metrics: Arc<Metrics>,
}

impl<K, V, T, M, S> Cache<K, V, T, M, S>
where
    K: Key,
    V: Value,
    T: TtlMode,
    M: ThreadModel,
    S: HashBuilder,
{
    fn shard_for(&self, hash: u64) -> &M::Lock<Shard<K, V, T>> {
        &self.shards[(hash & self.shard_mask) as usize]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether a live entry exists for `key`. No recency/frequency update.
    pub fn contains(&self, key: &K) -> bool {
        let hash = hash_one(&self.hash_builder, key);
        self.shard_for(hash).read().contains(hash, key)
    }

    /// Entry count summed across shards. Each shard is read under its own
    /// lock, so the sum is racy but never torn.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a clone of the cached value, updating the policy's
    /// recency/frequency metadata and enforcing TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = hash_one(&self.hash_builder, key);
        let value = self.shard_for(hash).write().get(hash, key);
        match value {
            Some(_) => self.metrics.hit.fetch_add(1, Ordering::Relaxed),
            None => self.metrics.miss.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    pub fn put(&self, key: K, value: V) {
        let hash = hash_one(&self.hash_builder, &key);
        let replaced = self
            .shard_for(hash)
            .write()
            .put(hash, key, value, T::Expiry::default());
        match replaced {
            true => self.metrics.replace.fetch_add(1, Ordering::Relaxed),
            false => self.metrics.insert.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Returns whether a live entry was removed.
    pub fn remove(&self, key: &K) -> bool {
        let hash = hash_one(&self.hash_builder, key);
        let removed = self.shard_for(hash).write().remove(hash, key);
        if removed {
            self.metrics.remove.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }
}

impl<K, V, M, S> Cache<K, V, TtlEnabled, M, S>
where
    K: Key,
    V: Value,
    M: ThreadModel,
    S: HashBuilder,
{
    /// Inserts an entry that dies `ttl` from now. Expiration is enforced at
    /// access time; there is no background sweeper.
    ///
    /// The relative `ttl` is converted once, here, to the absolute deadline
    /// stored in the node: `now_millis() + ttl` in milliseconds, saturating
    /// at `u64::MAX` (a saturated deadline never expires). An entry is dead
    /// once `now >= deadline`, so a zero `ttl` expires on the next access.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use larder::{Cache, CacheBuilder, LruConfig, TtlEnabled};
    ///
    /// let cache: Cache<u64, String, TtlEnabled> = CacheBuilder::new(64)
    ///     .with_ttl()
    ///     .with_eviction_config(LruConfig::default())
    ///     .build()
    ///     .unwrap();
    ///
    /// cache.put_with_ttl(1, "short-lived".to_string(), Duration::from_secs(60));
    /// assert_eq!(cache.get(&1), Some("short-lived".to_string()));
    /// ```
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let hash = hash_one(&self.hash_builder, &key);
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expiry = Some(now_millis().saturating_add(ttl_millis));
        let replaced = self.shard_for(hash).write().put(hash, key, value, expiry);
        match replaced {
            true => self.metrics.replace.fetch_add(1, Ordering::Relaxed),
            false => self.metrics.insert.fetch_add(1, Ordering::Relaxed),
        };
    }
}
