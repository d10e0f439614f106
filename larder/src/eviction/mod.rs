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

//! The eviction policies.
//!
//! Each policy owns a full shard: the node arena, the hash index and its
//! policy lists. All entry points take the key hash precomputed at the cache
//! boundary. `put` follows one skeleton everywhere: look the key up in the
//! index (acquiring a node only on a true miss), write the value, then either
//! run the policy's hit bookkeeping or evict down to budget and link the new
//! node in.

use std::sync::Arc;

use larder_common::code::{Key, Value};
use larder_common::ttl::{now_millis, TtlMode};

use crate::metrics::Metrics;

pub mod fifo;
pub mod lru;
pub mod s3fifo;
pub mod sieve;
pub mod tinylfu;

/// Uniform policy interface dispatched by the shard.
pub trait Eviction {
    type Key: Key;
    type Value: Value;
    type Ttl: TtlMode;
    type Config;

    fn new(
        capacity: usize,
        pool_capacity: usize,
        max_load_percentage: u8,
        config: &Self::Config,
        metrics: Arc<Metrics>,
    ) -> Self;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    /// TTL-aware lookup without any mutation.
    fn contains(&self, hash: u64, key: &Self::Key) -> bool;

    /// Returns a clone of the value; updates recency/frequency metadata and
    /// drops the entry when its TTL has passed.
    fn get(&mut self, hash: u64, key: &Self::Key) -> Option<Self::Value>;

    /// Inserts or overwrites. Returns whether the key was already present.
    fn put(
        &mut self,
        hash: u64,
        key: Self::Key,
        value: Self::Value,
        expiry: <Self::Ttl as TtlMode>::Expiry,
    ) -> bool;

    /// Returns whether the key was present.
    fn remove(&mut self, hash: u64, key: &Self::Key) -> bool;
}

/// Wall clock for expiry checks; free when TTL is disabled at the type
/// level.
pub(crate) fn access_clock<T: TtlMode>() -> u64 {
    if T::ENABLED {
        now_millis()
    } else {
        0
    }
}
