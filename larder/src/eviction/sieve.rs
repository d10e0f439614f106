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

pub struct SieveNode<K, V, T>
where
    T: TtlMode,
{
    base: BaseNode<K, V, T>,
    visited: bool,
}

impl<K, V, T> Default for SieveNode<K, V, T>
where
    T: TtlMode,
{
    fn default() -> Self {
        Self {
            base: BaseNode::default(),
            visited: false,
        }
    }
}

impl<K, V, T> Linked for SieveNode<K, V, T>
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

impl<K, V, T> Node for SieveNode<K, V, T>
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

/// SIEVE: a single list with per-node visited bits and a moving hand.
///
/// Newcomers are prepended at the head. The hand scans from its last stop
/// toward the head, clearing visited bits, and evicts the first unvisited
/// node it meets, wrapping from the head back to the tail. At worst a scan
/// touches every node twice, once to clear and once to evict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SieveConfig {}

pub struct Sieve<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    arena: Arena<SieveNode<K, V, T>>,
    indexer: HashIndexer<SieveNode<K, V, T>>,
    queue: Dlist<SieveNode<K, V, T>>,
    hand: Option<NodeRef>,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl<K, V, T> Sieve<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    /// Unlinks `node`, retargeting the hand to the predecessor if it pointed
    /// here.
    fn unlink(&mut self, node: NodeRef) {
        strict_assert!(self.arena.get(node).base().is_in_list());
        if self.hand == Some(node) {
            self.hand = self.queue.prev(&self.arena, node);
        }
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

    fn evict(&mut self) {
        let mut cursor = self.hand;
        loop {
            // Wrapping from the head back to the tail guarantees termination.
            let node = match cursor.or_else(|| self.queue.back()) {
                Some(node) => node,
                None => return,
            };
            if self.arena.get(node).visited {
                self.arena.get_mut(node).visited = false;
                cursor = self.queue.prev(&self.arena, node);
            } else {
                self.hand = self.queue.prev(&self.arena, node);
                self.unlink(node);
                self.indexer.remove_node(&mut self.arena, node);
                self.release(node);
                self.metrics.evict.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }
}

impl<K, V, T> Eviction for Sieve<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    type Key = K;
    type Value = V;
    type Ttl = T;
    type Config = SieveConfig;

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
            hand: None,
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
        self.arena.get_mut(node).visited = true;
        Some(self.arena.get(node).base().value().clone())
    }

    fn put(&mut self, hash: u64, key: K, value: V, expiry: T::Expiry) -> bool {
        let gop = self.indexer.get_or_insert(&mut self.arena, hash, key);
        self.arena.get_mut(gop.node).base_mut().update(value, expiry);
        if gop.found_existing {
            self.arena.get_mut(gop.node).visited = true;
            return true;
        }

        while self.indexer.len() > self.capacity {
            self.evict();
        }

        self.arena.get_mut(gop.node).visited = false;
        self.queue.push_front(&mut self.arena, gop.node);
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
