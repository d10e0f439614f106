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
use crate::sketch::CountMinSketch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Window,
    Probationary,
    Protected,
}

pub struct TinyLfuNode<K, V, T>
where
    T: TtlMode,
{
    base: BaseNode<K, V, T>,
    region: Region,
}

impl<K, V, T> Default for TinyLfuNode<K, V, T>
where
    T: TtlMode,
{
    fn default() -> Self {
        Self {
            base: BaseNode::default(),
            region: Region::Window,
        }
    }
}

impl<K, V, T> Linked for TinyLfuNode<K, V, T>
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

impl<K, V, T> Node for TinyLfuNode<K, V, T>
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

/// W-TinyLFU: an admission window in front of a segmented main area, with a
/// count-min sketch deciding admission.
///
/// New keys enter the Window. A key squeezed out of the Window is admitted
/// to the Probationary segment only if its sketched frequency beats the
/// Probationary head's, which keeps one-shot keys from flushing the main
/// area. Hits in Probationary promote to Protected, demoting Protected's
/// head when it is full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TinyLfuConfig {
    /// Rows in the count-min sketch.
    pub cms_depth: usize,
    /// Share of the capacity given to the admission window.
    pub window_size_percent: u8,
    /// The sketch ages once `capacity * reset_multiplier` increments have
    /// been recorded.
    pub reset_multiplier: usize,
}

impl Default for TinyLfuConfig {
    fn default() -> Self {
        Self {
            cms_depth: 3,
            window_size_percent: 1,
            reset_multiplier: 10,
        }
    }
}

pub struct TinyLfu<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    arena: Arena<TinyLfuNode<K, V, T>>,
    indexer: HashIndexer<TinyLfuNode<K, V, T>>,
    window: Dlist<TinyLfuNode<K, V, T>>,
    probationary: Dlist<TinyLfuNode<K, V, T>>,
    protected: Dlist<TinyLfuNode<K, V, T>>,
    sketch: CountMinSketch,
    window_size: usize,
    probationary_size: usize,
    protected_size: usize,
    metrics: Arc<Metrics>,
}

impl<K, V, T> TinyLfu<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    fn unlink(&mut self, node: NodeRef) {
        strict_assert!(self.arena.get(node).base().is_in_list());
        let region = self.arena.get(node).region;
        match region {
            Region::Window => self.window.remove(&mut self.arena, node),
            Region::Probationary => self.probationary.remove(&mut self.arena, node),
            Region::Protected => self.protected.remove(&mut self.arena, node),
        }
        self.arena.get_mut(node).base_mut().set_in_list(false);
    }

    fn release(&mut self, node: NodeRef) {
        let entry = self.arena.get_mut(node);
        entry.region = Region::Window;
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

    fn promote(&mut self, node: NodeRef) {
        match self.arena.get(node).region {
            Region::Window => self.window.move_to_back(&mut self.arena, node),
            Region::Probationary => {
                self.probationary.remove(&mut self.arena, node);
                if self.protected.len() >= self.protected_size {
                    if let Some(demoted) = self.protected.pop_front(&mut self.arena) {
                        self.arena.get_mut(demoted).region = Region::Probationary;
                        self.probationary.push_back(&mut self.arena, demoted);
                    }
                }
                self.arena.get_mut(node).region = Region::Protected;
                self.protected.push_back(&mut self.arena, node);
            }
            Region::Protected => self.protected.move_to_back(&mut self.arena, node),
        }
    }

    /// Decides the fate of a key squeezed out of the Window.
    fn try_admit_to_main(&mut self, candidate: NodeRef) {
        if self.probationary.len() < self.probationary_size {
            self.arena.get_mut(candidate).region = Region::Probationary;
            self.probationary.push_back(&mut self.arena, candidate);
            return;
        }

        let victim = match self.probationary.front() {
            Some(victim) => victim,
            None => {
                self.arena.get_mut(candidate).region = Region::Probationary;
                self.probationary.push_back(&mut self.arena, candidate);
                return;
            }
        };
        let victim_estimate = self.sketch.estimate(self.arena.get(victim).base().hash());
        let candidate_estimate = self.sketch.estimate(self.arena.get(candidate).base().hash());

        if victim_estimate > candidate_estimate {
            self.arena.get_mut(candidate).base_mut().set_in_list(false);
            self.indexer.remove_node(&mut self.arena, candidate);
            self.release(candidate);
        } else {
            self.probationary.remove(&mut self.arena, victim);
            self.arena.get_mut(victim).base_mut().set_in_list(false);
            self.indexer.remove_node(&mut self.arena, victim);
            self.release(victim);
            self.arena.get_mut(candidate).region = Region::Probationary;
            self.probationary.push_back(&mut self.arena, candidate);
        }
        self.metrics.evict.fetch_add(1, Ordering::Relaxed);
    }
}

impl<K, V, T> Eviction for TinyLfu<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    type Key = K;
    type Value = V;
    type Ttl = T;
    type Config = TinyLfuConfig;

    fn new(
        capacity: usize,
        pool_capacity: usize,
        max_load_percentage: u8,
        config: &Self::Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        let window_size = (capacity * config.window_size_percent as usize / 100).max(1);
        let main_size = capacity.saturating_sub(window_size).max(2);
        let protected_size = (main_size * 8 / 10).max(1);
        Self {
            arena: Arena::with_capacity(pool_capacity),
            indexer: HashIndexer::with_capacity(capacity, max_load_percentage),
            window: Dlist::new(),
            probationary: Dlist::new(),
            protected: Dlist::new(),
            sketch: CountMinSketch::new(
                capacity.max(1),
                config.cms_depth,
                capacity * config.reset_multiplier,
            ),
            window_size,
            probationary_size: main_size - protected_size,
            protected_size,
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
        self.sketch.increment(hash);
        self.promote(node);
        Some(self.arena.get(node).base().value().clone())
    }

    fn put(&mut self, hash: u64, key: K, value: V, expiry: T::Expiry) -> bool {
        let gop = self.indexer.get_or_insert(&mut self.arena, hash, key);
        if gop.found_existing {
            self.arena.get_mut(gop.node).base_mut().update(value, expiry);
            self.sketch.increment(hash);
            self.promote(gop.node);
            return true;
        }

        self.sketch.increment(hash);
        let entry = self.arena.get_mut(gop.node);
        entry.base_mut().update(value, expiry);
        entry.region = Region::Window;
        entry.base_mut().set_in_list(true);

        let window_was_full = self.window.len() >= self.window_size;
        self.window.push_back(&mut self.arena, gop.node);
        if window_was_full {
            if let Some(candidate) = self.window.pop_front(&mut self.arena) {
                self.try_admit_to_main(candidate);
            }
        }
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
mod tests {
    use itertools::Itertools;
    use larder_common::ttl::TtlDisabled;

    use super::*;

    impl<K, V, T> TinyLfu<K, V, T>
    where
        K: Key + Clone,
        V: Value,
        T: TtlMode,
    {
        fn dump(&self, segment: &Dlist<TinyLfuNode<K, V, T>>) -> Vec<K> {
            segment
                .iter(&self.arena)
                .map(|node| self.arena.get(node).base().key().clone())
                .collect_vec()
        }
    }

    fn tinylfu(capacity: usize) -> TinyLfu<u64, u64, TtlDisabled> {
        TinyLfu::new(
            capacity,
            capacity + 1,
            60,
            &TinyLfuConfig::default(),
            Arc::new(Metrics::default()),
        )
    }

    #[test]
    fn test_derived_sizes() {
        let cache = tinylfu(5);
        assert_eq!(cache.window_size, 1);
        assert_eq!(cache.protected_size, 3);
        assert_eq!(cache.probationary_size, 1);

        let cache = tinylfu(1000);
        assert_eq!(cache.window_size, 10);
        assert_eq!(cache.protected_size, 792);
        assert_eq!(cache.probationary_size, 198);
    }

    #[test]
    fn test_sketch_gated_admission() {
        let mut cache = tinylfu(5);

        cache.put(1, 1, 1, ());
        cache.put(2, 2, 2, ());
        assert_eq!(cache.get(1, &1), Some(1));
        cache.put(3, 3, 3, ());
        assert_eq!(cache.get(2, &2), Some(2));
        cache.put(4, 4, 4, ());
        assert_eq!(cache.get(3, &3), Some(3));
        cache.put(5, 5, 5, ());
        for _ in 0..3 {
            assert_eq!(cache.get(4, &4), Some(4));
        }
        cache.put(6, 6, 6, ());

        // Key 5 lost the admission duel against the probationary head.
        assert!(!cache.contains(5, &5));
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.dump(&cache.window), vec![6]);
        assert_eq!(cache.dump(&cache.probationary), vec![1]);
        assert_eq!(cache.dump(&cache.protected), vec![2, 3, 4]);

        // The index covers exactly the three segments.
        assert_eq!(
            cache.indexer.len(),
            cache.window.len() + cache.probationary.len() + cache.protected.len()
        );
    }

    #[test]
    fn test_probationary_hit_promotes_and_demotes() {
        let mut cache = tinylfu(5);
        // Fill: window holds one key, the rest flows through probationary.
        cache.put(1, 1, 1, ());
        cache.put(2, 2, 2, ());
        assert_eq!(cache.dump(&cache.probationary), vec![1]);

        // Hit in probationary moves to protected.
        cache.get(1, &1);
        assert!(cache.dump(&cache.probationary).is_empty());
        assert_eq!(cache.dump(&cache.protected), vec![1]);

        // Fill protected to its budget of 3, then one more promotion demotes
        // the protected head back to probationary.
        cache.put(3, 3, 3, ());
        cache.get(2, &2);
        cache.put(4, 4, 4, ());
        cache.get(3, &3);
        assert_eq!(cache.dump(&cache.protected), vec![1, 2, 3]);

        cache.put(5, 5, 5, ());
        cache.get(4, &4);
        assert_eq!(cache.dump(&cache.protected), vec![2, 3, 4]);
        assert_eq!(cache.dump(&cache.probationary), vec![1]);
    }

    #[test]
    fn test_window_hit_stays_in_window() {
        let mut cache = tinylfu(200);
        // window_size = 2 at capacity 200.
        assert_eq!(cache.window_size, 2);
        cache.put(1, 1, 1, ());
        cache.put(2, 2, 2, ());
        assert_eq!(cache.dump(&cache.window), vec![1, 2]);

        cache.get(1, &1);
        assert_eq!(cache.dump(&cache.window), vec![2, 1]);
        assert!(cache.dump(&cache.probationary).is_empty());
    }

    #[test]
    fn test_replace_updates_value_and_counts_access() {
        let mut cache = tinylfu(5);
        cache.put(1, 1, 1, ());
        assert!(cache.put(1, 1, 11, ()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1, &1), Some(11));
    }
}
