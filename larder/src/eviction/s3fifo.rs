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

use std::sync::atomic::Ordering;
use std::sync::Arc;

use larder_common::code::{Key, Value};
use larder_common::strict_assert;
use larder_common::ttl::TtlMode;
use larder_intrusive::arena::{Arena, Link, Linked, NodeRef};
use larder_intrusive::dlist::Dlist;
use serde::{Deserialize, Serialize};

use crate::eviction::{access_clock, Eviction};
use crate::indexer::HashIndexer;
use crate::metrics::Metrics;
use crate::node::{BaseNode, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueId {
    Small,
    Main,
    Ghost,
}

pub struct S3FifoNode<K, V, T>
where
    T: TtlMode,
{
    base: BaseNode<K, V, T>,
    queue: QueueId,
    freq: u8,
}

impl<K, V, T> Default for S3FifoNode<K, V, T>
where
    T: TtlMode,
{
    fn default() -> Self {
        Self {
            base: BaseNode::default(),
            queue: QueueId::Small,
            freq: 0,
        }
    }
}

impl<K, V, T> Linked for S3FifoNode<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    fn link(&self) -> &Link {
        self.base.link()
    }

    fn link_mut(&mut self) -> &mut Link {
        self.base.link_mut()
    }
}

impl<K, V, T> Node for S3FifoNode<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    type Key = K;
    type Value = V;
    type Ttl = T;

    fn base(&self) -> &BaseNode<K, V, T> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseNode<K, V, T> {
        &mut self.base
    }
}

/// S3-FIFO: small, main and ghost FIFO queues.
///
/// New keys enter Small. When Small is over budget its head is promoted to
/// Main if it has been accessed more than `promotion_threshold` times,
/// otherwise its value is dropped and the key parks in Ghost. A key
/// re-inserted while parked in Ghost goes straight to Main. Main evicts with
/// a lazy second-chance scan bounded by the 2-bit access count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3FifoConfig {
    /// Share of the capacity given to the Small queue.
    pub small_size_percent: u8,
    /// Access count above which a Small head is promoted to Main instead of
    /// parked in Ghost. The paper suggests 1; short-horizon hit rates favor
    /// the default of 0.
    pub promotion_threshold: u8,
}

impl Default for S3FifoConfig {
    fn default() -> Self {
        Self {
            small_size_percent: 10,
            promotion_threshold: 0,
        }
    }
}

const FREQ_CAP: u8 = 3;

pub struct S3Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    arena: Arena<S3FifoNode<K, V, T>>,
    indexer: HashIndexer<S3FifoNode<K, V, T>>,
    small: Dlist<S3FifoNode<K, V, T>>,
    main: Dlist<S3FifoNode<K, V, T>>,
    ghost: Dlist<S3FifoNode<K, V, T>>,
    small_size: usize,
    other_size: usize,
    max_size: usize,
    promotion_threshold: u8,
    metrics: Arc<Metrics>,
}

impl<K, V, T> S3Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    fn total(&self) -> usize {
        self.small.len() + self.main.len() + self.ghost.len()
    }

    fn unlink(&mut self, node: NodeRef) {
        strict_assert!(self.arena.get(node).base().is_in_list());
        let queue = self.arena.get(node).queue;
        match queue {
            QueueId::Small => self.small.remove(&mut self.arena, node),
            QueueId::Main => self.main.remove(&mut self.arena, node),
            QueueId::Ghost => self.ghost.remove(&mut self.arena, node),
        }
        self.arena.get_mut(node).base_mut().set_in_list(false);
    }

    fn release(&mut self, node: NodeRef) {
        let entry = self.arena.get_mut(node);
        entry.queue = QueueId::Small;
        entry.freq = 0;
        entry.base_mut().reset();
        self.arena.release(node);
    }

    fn expire_if_dead(&mut self, node: NodeRef) -> bool {
        if !T::ENABLED || !self.indexer.check_ttl(&mut self.arena, node, access_clock::<T>()) {
            return false;
        }
        self.unlink(node);
        self.release(node);
        self.metrics.expire.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn evict_to_budget(&mut self) {
        while self.total() >= self.max_size {
            if self.small.len() >= self.small_size {
                self.evict_small();
            } else if !self.main.is_empty() {
                self.evict_main();
            } else {
                strict_assert!(false, "s3-fifo eviction stalled");
                break;
            }
        }
    }

    /// Drains Small heads into Main until one misses the promotion bar and
    /// parks in Ghost.
    fn evict_small(&mut self) {
        while let Some(node) = self.small.pop_front(&mut self.arena) {
            if self.arena.get(node).freq > self.promotion_threshold {
                let entry = self.arena.get_mut(node);
                entry.freq = 0;
                entry.queue = QueueId::Main;
                self.main.push_back(&mut self.arena, node);
            } else {
                if self.ghost.len() >= self.other_size {
                    if let Some(dead) = self.ghost.pop_front(&mut self.arena) {
                        self.arena.get_mut(dead).base_mut().set_in_list(false);
                        self.indexer.remove_node(&mut self.arena, dead);
                        self.release(dead);
                    }
                }
                let entry = self.arena.get_mut(node);
                entry.queue = QueueId::Ghost;
                entry.base_mut().clear_value();
                self.ghost.push_back(&mut self.arena, node);
                self.metrics.evict.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Second-chance scan of Main: positive counts are decremented and
    /// recycled to the tail, a zero count is evicted.
    fn evict_main(&mut self) {
        while let Some(node) = self.main.pop_front(&mut self.arena) {
            if self.arena.get(node).freq > 0 {
                self.arena.get_mut(node).freq -= 1;
                self.main.push_back(&mut self.arena, node);
            } else {
                self.arena.get_mut(node).base_mut().set_in_list(false);
                self.indexer.remove_node(&mut self.arena, node);
                self.release(node);
                self.metrics.evict.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }
}

impl<K, V, T> Eviction for S3Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    type Key = K;
    type Value = V;
    type Ttl = T;
    type Config = S3FifoConfig;

    fn new(
        capacity: usize,
        pool_capacity: usize,
        max_load_percentage: u8,
        config: &Self::Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        let small_size = (capacity * config.small_size_percent as usize / 100).max(1);
        let other_size = ((capacity.saturating_sub(small_size)) / 2).max(1);
        Self {
            arena: Arena::with_capacity(pool_capacity),
            indexer: HashIndexer::with_capacity(capacity, max_load_percentage),
            small: Dlist::new(),
            main: Dlist::new(),
            ghost: Dlist::new(),
            small_size,
            other_size,
            max_size: small_size + 2 * other_size,
            promotion_threshold: config.promotion_threshold,
            metrics,
        }
    }

    /// Value-bearing entries only; parked ghost keys are not counted.
    fn len(&self) -> usize {
        self.small.len() + self.main.len()
    }

    fn contains(&self, hash: u64, key: &K) -> bool {
        match self.indexer.get(&self.arena, hash, key) {
            Some(node) => {
                let entry = self.arena.get(node);
                entry.queue != QueueId::Ghost && !entry.base().is_expired(access_clock::<T>())
            }
            None => false,
        }
    }

    fn get(&mut self, hash: u64, key: &K) -> Option<V> {
        let node = self.indexer.get(&self.arena, hash, key)?;
        // A ghost hit is a miss: the key is only parked for admission.
        if self.arena.get(node).queue == QueueId::Ghost {
            return None;
        }
        if self.expire_if_dead(node) {
            return None;
        }
        let entry = self.arena.get_mut(node);
        entry.freq = (entry.freq + 1).min(FREQ_CAP);
        Some(entry.base().value().clone())
    }

    fn put(&mut self, hash: u64, key: K, value: V, expiry: T::Expiry) -> bool {
        let gop = self.indexer.get_or_insert(&mut self.arena, hash, key);
        if gop.found_existing {
            let entry = self.arena.get_mut(gop.node);
            entry.base_mut().update(value, expiry);
            if entry.queue == QueueId::Ghost {
                // Re-insertion of a parked key: straight to Main, access
                // count retained.
                self.ghost.remove(&mut self.arena, gop.node);
                self.arena.get_mut(gop.node).queue = QueueId::Main;
                self.main.push_back(&mut self.arena, gop.node);
                return false;
            }
            entry.freq = (entry.freq + 1).min(FREQ_CAP);
            return true;
        }

        self.evict_to_budget();

        let entry = self.arena.get_mut(gop.node);
        entry.base_mut().update(value, expiry);
        entry.queue = QueueId::Small;
        entry.freq = 0;
        entry.base_mut().set_in_list(true);
        self.small.push_back(&mut self.arena, gop.node);
        false
    }

    fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.indexer.remove(&mut self.arena, hash, key) {
            Some(node) => {
                let was_ghost = self.arena.get(node).queue == QueueId::Ghost;
                self.unlink(node);
                self.release(node);
                !was_ghost
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use larder_common::ttl::TtlDisabled;

    use super::*;

    impl<K, V, T> S3Fifo<K, V, T>
    where
        K: Key + Clone,
        V: Value,
        T: TtlMode,
    {
        fn dump(&self, queue: &Dlist<S3FifoNode<K, V, T>>) -> Vec<(K, u8)> {
            queue
                .iter(&self.arena)
                .map(|node| {
                    let entry = self.arena.get(node);
                    (entry.base().key().clone(), entry.freq)
                })
                .collect_vec()
        }
    }

    fn s3fifo(capacity: usize) -> S3Fifo<u64, u64, TtlDisabled> {
        S3Fifo::new(
            capacity,
            capacity + 1,
            60,
            &S3FifoConfig::default(),
            Arc::new(Metrics::default()),
        )
    }

    #[test]
    fn test_derived_sizes() {
        let cache = s3fifo(5);
        assert_eq!(cache.small_size, 1);
        assert_eq!(cache.other_size, 2);
        assert_eq!(cache.max_size, 5);

        let cache = s3fifo(100);
        assert_eq!(cache.small_size, 10);
        assert_eq!(cache.other_size, 45);
        assert_eq!(cache.max_size, 100);
    }

    #[test]
    fn test_one_shot_head_is_evicted_first() {
        let mut cache = s3fifo(5);
        for key in 1..=5u64 {
            cache.put(key, key, key, ());
        }
        for key in 1..=4u64 {
            assert_eq!(cache.get(key, &key), Some(key));
        }
        cache.put(6, 6, 6, ());

        // Key 1 went Small -> Main with its count reset and was the first
        // zero-count head of Main.
        assert!(!cache.contains(1, &1));
        assert_eq!(cache.get(1, &1), None);
        for key in 2..=4u64 {
            assert_eq!(cache.get(key, &key), Some(key));
        }
        assert_eq!(cache.get(6, &6), Some(6));
        // Key 5 was never accessed, so it parked in Ghost: present in the
        // bookkeeping but a miss for callers and absent from the count.
        assert!(!cache.contains(5, &5));
        assert_eq!(cache.get(5, &5), None);
        assert_eq!(cache.dump(&cache.ghost), vec![(5, 0)]);
        assert_eq!(cache.len(), 4);

        // The index covers exactly the three queues.
        assert_eq!(
            cache.indexer.len(),
            cache.small.len() + cache.main.len() + cache.ghost.len()
        );
    }

    #[test]
    fn test_ghost_reinsertion_goes_to_main() {
        let mut cache = s3fifo(5);
        for key in 1..=5u64 {
            cache.put(key, key, key, ());
        }
        for key in 1..=4u64 {
            cache.get(key, &key);
        }
        cache.put(6, 6, 6, ());
        assert_eq!(cache.dump(&cache.ghost), vec![(5, 0)]);

        cache.put(5, 5, 55, ());
        assert!(cache.dump(&cache.ghost).is_empty());
        assert_eq!(cache.dump(&cache.main).last(), Some(&(5, 0)));
        assert_eq!(cache.get(5, &5), Some(55));
    }

    #[test]
    fn test_freq_is_capped() {
        let mut cache = s3fifo(10);
        cache.put(1, 1, 1, ());
        for _ in 0..10 {
            cache.get(1, &1);
        }
        assert_eq!(cache.dump(&cache.small), vec![(1, FREQ_CAP)]);
    }

    #[test]
    fn test_main_second_chance_recycles() {
        let mut cache = s3fifo(10);
        // small_size = 1, other_size = 4, max_size = 9.
        for key in 1..=9u64 {
            cache.put(key, key, key, ());
            cache.get(key, &key);
        }
        assert_eq!(cache.dump(&cache.small).len(), 9);

        // Every head was accessed once, so the whole Small queue promotes to
        // Main with counts reset, and Main then evicts its zero-count head.
        cache.put(10, 10, 10, ());
        assert!(!cache.contains(1, &1));
        assert_eq!(
            cache.dump(&cache.main),
            (2..=9u64).map(|key| (key, 0)).collect_vec()
        );
        assert_eq!(cache.dump(&cache.small), vec![(10, 0)]);
        assert!(cache.dump(&cache.ghost).is_empty());
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn test_remove_follows_queue_tag() {
        let mut cache = s3fifo(5);
        for key in 1..=5u64 {
            cache.put(key, key, key, ());
        }
        for key in 1..=4u64 {
            cache.get(key, &key);
        }
        cache.put(6, 6, 6, ());

        // 5 is a ghost: physically dropped, but reported absent.
        assert!(!cache.remove(5, &5));
        assert!(cache.dump(&cache.ghost).is_empty());

        // 3 is live in Main.
        assert!(cache.remove(3, &3));
        assert!(!cache.remove(3, &3));
        assert_eq!(cache.get(3, &3), None);
    }
}
