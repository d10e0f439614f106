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

pub struct FifoNode<K, V, T>
where
    T: TtlMode,
{
    base: BaseNode<K, V, T>,
}

impl<K, V, T> Default for FifoNode<K, V, T>
where
    T: TtlMode,
{
    fn default() -> Self {
        Self {
            base: BaseNode::default(),
        }
    }
}

impl<K, V, T> Linked for FifoNode<K, V, T>
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

impl<K, V, T> Node for FifoNode<K, V, T>
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

/// First-in-first-out. Insertion order only; hits do not reorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FifoConfig {}

pub struct Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    arena: Arena<FifoNode<K, V, T>>,
    indexer: HashIndexer<FifoNode<K, V, T>>,
    queue: Dlist<FifoNode<K, V, T>>,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl<K, V, T> Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    fn unlink(&mut self, node: NodeRef) {
        strict_assert!(self.arena.get(node).base().is_in_list());
        self.queue.remove(&mut self.arena, node);
        self.arena.get_mut(node).base_mut().set_in_list(false);
    }

    fn release(&mut self, node: NodeRef) {
        self.arena.get_mut(node).base_mut().reset();
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
}

impl<K, V, T> Eviction for Fifo<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    type Key = K;
    type Value = V;
    type Ttl = T;
    type Config = FifoConfig;

    fn new(
        capacity: usize,
        pool_capacity: usize,
        max_load_percentage: u8,
        _: &Self::Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            arena: Arena::with_capacity(pool_capacity),
            indexer: HashIndexer::with_capacity(capacity, max_load_percentage),
            queue: Dlist::new(),
            capacity,
            metrics,
        }
    }

    fn len(&self) -> usize {
        self.indexer.len()
    }

    fn contains(&self, hash: u64, key: &K) -> bool {
        match self.indexer.get(&self.arena, hash, key) {
            Some(node) => !self.arena.get(node).base().is_expired(access_clock::<T>()),
            None => false,
        }
    }

    fn get(&mut self, hash: u64, key: &K) -> Option<V> {
        let node = self.indexer.get(&self.arena, hash, key)?;
        if self.expire_if_dead(node) {
            return None;
        }
        Some(self.arena.get(node).base().value().clone())
    }

    fn put(&mut self, hash: u64, key: K, value: V, expiry: T::Expiry) -> bool {
        let gop = self.indexer.get_or_insert(&mut self.arena, hash, key);
        self.arena.get_mut(gop.node).base_mut().update(value, expiry);
        if gop.found_existing {
            return true;
        }

        while self.indexer.len() > self.capacity {
            let Some(victim) = self.queue.pop_front(&mut self.arena) else {
                break;
            };
            self.arena.get_mut(victim).base_mut().set_in_list(false);
            self.indexer.remove_node(&mut self.arena, victim);
            self.release(victim);
            self.metrics.evict.fetch_add(1, Ordering::Relaxed);
        }

        self.queue.push_back(&mut self.arena, gop.node);
        self.arena.get_mut(gop.node).base_mut().set_in_list(true);
        false
    }

    fn remove(&mut self, hash: u64, key: &K) -> bool {
        match self.indexer.remove(&mut self.arena, hash, key) {
            Some(node) => {
                self.unlink(node);
                self.release(node);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    impl<K, V, T> Fifo<K, V, T>
    where
        K: Key + Clone,
        V: Value,
        T: TtlMode,
    {
        pub(crate) fn dump(&self) -> Vec<K> {
            self.queue
                .iter(&self.arena)
                .map(|node| self.arena.get(node).base().key().clone())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use larder_common::ttl::{now_millis, TtlDisabled, TtlEnabled};

    use super::*;

    fn fifo(capacity: usize) -> Fifo<u64, u64, TtlDisabled> {
        Fifo::new(
            capacity,
            capacity + 1,
            60,
            &FifoConfig::default(),
            Arc::new(Metrics::default()),
        )
    }

    #[test]
    fn test_insertion_order_eviction() {
        let mut fifo = fifo(3);
        for key in 1..=5u64 {
            fifo.put(key, key, key * 10, ());
        }
        assert_eq!(fifo.dump(), vec![3, 4, 5]);
        assert_eq!(fifo.len(), 3);
        assert!(!fifo.contains(1, &1));
        assert!(!fifo.contains(2, &2));
        assert_eq!(fifo.get(4, &4), Some(40));
    }

    #[test]
    fn test_get_does_not_reorder() {
        let mut fifo = fifo(3);
        for key in 1..=3u64 {
            fifo.put(key, key, key, ());
        }
        assert_eq!(fifo.get(1, &1), Some(1));
        fifo.put(4, 4, 4, ());
        assert!(!fifo.contains(1, &1));
        assert_eq!(fifo.dump(), vec![2, 3, 4]);
    }

    #[test]
    fn test_replace_keeps_position_and_count() {
        let mut fifo = fifo(3);
        for key in 1..=3u64 {
            fifo.put(key, key, key, ());
        }
        assert!(fifo.put(1, 1, 111, ()));
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.dump(), vec![1, 2, 3]);
        assert_eq!(fifo.get(1, &1), Some(111));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut fifo = fifo(3);
        fifo.put(7, 7, 7, ());
        assert!(fifo.remove(7, &7));
        assert!(!fifo.remove(7, &7));
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn test_expired_entry_is_dropped_on_get() {
        let mut fifo: Fifo<u64, u64, TtlEnabled> = Fifo::new(
            3,
            4,
            60,
            &FifoConfig::default(),
            Arc::new(Metrics::default()),
        );
        fifo.put(1, 1, 1, Some(now_millis().saturating_sub(1)));
        fifo.put(2, 2, 2, Some(now_millis() + 60_000));
        assert!(!fifo.contains(1, &1));
        assert_eq!(fifo.get(1, &1), None);
        assert_eq!(fifo.len(), 1);
        assert_eq!(fifo.get(2, &2), Some(2));
    }
}
