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

use larder_common::strict_assert;
use larder_intrusive::arena::{Arena, NodeRef};
use tracing::trace;

use crate::node::Node;

/// Key-to-node map with linear probing over a power-of-two slot array.
///
/// Every entry point takes the precomputed 64-bit key hash; the hash stored
/// in the node is reused for probe comparisons and rehashing, so keys are
/// hashed exactly once per cache operation and never cloned.
///
/// Deletions leave tombstones. After any mutation, once the tombstones reach
/// `max_load_percentage` percent of the live entries the table is rebuilt in
/// place, which bounds probe-length degradation under delete-heavy workloads
/// without a background task.
pub struct HashIndexer<N> {
    slots: Vec<Slot>,
    live: usize,
    tombstones: usize,
    max_load_percentage: u8,
    _marker: PhantomData<fn(N)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(NodeRef),
}

/// Outcome of [`HashIndexer::get_or_insert`].
pub struct GetOrInsert {
    pub node: NodeRef,
    pub found_existing: bool,
}

impl<N> HashIndexer<N>
where
    N: Node,
{
    /// Sizes the table for `capacity` entries plus the transient extra one
    /// held between insertion and eviction.
    pub fn with_capacity(capacity: usize, max_load_percentage: u8) -> Self {
        strict_assert!(max_load_percentage > 0 && max_load_percentage <= 100);
        let wanted = (capacity + 1) * 100 / max_load_percentage as usize + 1;
        let slots = vec![Slot::Empty; wanted.max(8).next_power_of_two()];
        Self {
            slots,
            live: 0,
            tombstones: 0,
            max_load_percentage,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn max_load(&self) -> usize {
        self.max_load_percentage as usize
    }

    /// Index of the occupied slot holding `key`, probing until a hard miss.
    fn probe(&self, arena: &Arena<N>, hash: u64, key: &N::Key) -> Option<usize> {
        let mut idx = hash as usize & self.mask();
        loop {
            match self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied(node) => {
                    let base = arena.get(node).base();
                    if base.hash() == hash && base.key() == key {
                        return Some(idx);
                    }
                }
                Slot::Tombstone => {}
            }
            idx = (idx + 1) & self.mask();
        }
    }

    pub fn get(&self, arena: &Arena<N>, hash: u64, key: &N::Key) -> Option<NodeRef> {
        let idx = self.probe(arena, hash, key)?;
        match self.slots[idx] {
            Slot::Occupied(node) => Some(node),
            _ => unreachable!("probe returned a non-occupied slot"),
        }
    }

    pub fn contains(&self, arena: &Arena<N>, hash: u64, key: &N::Key) -> bool {
        self.probe(arena, hash, key).is_some()
    }

    /// Looks `key` up, acquiring and claiming a node from the arena only on
    /// a true miss. The caller is responsible for evicting afterwards if the
    /// insertion overflowed its budget.
    pub fn get_or_insert(&mut self, arena: &mut Arena<N>, hash: u64, key: N::Key) -> GetOrInsert {
        if let Some(node) = self.get(arena, hash, &key) {
            return GetOrInsert {
                node,
                found_existing: true,
            };
        }

        if (self.live + self.tombstones + 1) * 100 > self.slots.len() * self.max_load() {
            let new_len = if (self.live + 1) * 100 > self.slots.len() * self.max_load() {
                self.slots.len() * 2
            } else {
                self.slots.len()
            };
            self.rehash(arena, new_len);
        }

        let mut idx = hash as usize & self.mask();
        loop {
            match self.slots[idx] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    self.tombstones -= 1;
                    break;
                }
                Slot::Occupied(_) => idx = (idx + 1) & self.mask(),
            }
        }

        let node = arena.acquire();
        let base = arena.get_mut(node).base_mut();
        base.init(hash, key);
        base.set_in_index(true);
        self.slots[idx] = Slot::Occupied(node);
        self.live += 1;

        GetOrInsert {
            node,
            found_existing: false,
        }
    }

    /// Removes `key`, returning its node for the caller to unlink and
    /// release.
    pub fn remove(&mut self, arena: &mut Arena<N>, hash: u64, key: &N::Key) -> Option<NodeRef> {
        let idx = self.probe(arena, hash, key)?;
        let Slot::Occupied(node) = self.slots[idx] else {
            unreachable!("probe returned a non-occupied slot");
        };
        self.evict_slot(arena, idx, node);
        self.maybe_purge_tombstones(arena);
        Some(node)
    }

    /// Removes a node the caller already holds, matching by identity so no
    /// key borrow is needed.
    pub fn remove_node(&mut self, arena: &mut Arena<N>, node: NodeRef) {
        let hash = arena.get(node).base().hash();
        let mut idx = hash as usize & self.mask();
        loop {
            match self.slots[idx] {
                Slot::Occupied(candidate) if candidate == node => break,
                Slot::Empty => unreachable!("node is not indexed"),
                _ => idx = (idx + 1) & self.mask(),
            }
        }
        self.evict_slot(arena, idx, node);
        self.maybe_purge_tombstones(arena);
    }

    /// Evicts `node` from the index if its expiry has passed.
    pub fn check_ttl(&mut self, arena: &mut Arena<N>, node: NodeRef, now_millis: u64) -> bool {
        if !arena.get(node).base().is_expired(now_millis) {
            return false;
        }
        self.remove_node(arena, node);
        true
    }

    fn evict_slot(&mut self, arena: &mut Arena<N>, idx: usize, node: NodeRef) {
        strict_assert!(arena.get(node).base().is_in_index());
        arena.get_mut(node).base_mut().set_in_index(false);
        self.slots[idx] = Slot::Tombstone;
        self.live -= 1;
        self.tombstones += 1;
    }

    fn maybe_purge_tombstones(&mut self, arena: &Arena<N>) {
        if self.tombstones > 0 && self.tombstones * 100 >= self.live * self.max_load() {
            self.rehash(arena, self.slots.len());
        }
    }

    fn rehash(&mut self, arena: &Arena<N>, new_len: usize) {
        trace!(
            live = self.live,
            tombstones = self.tombstones,
            old_len = self.slots.len(),
            new_len,
            "rehashing index"
        );
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; new_len]);
        let mask = self.slots.len() - 1;
        for slot in old {
            let Slot::Occupied(node) = slot else {
                continue;
            };
            let mut idx = arena.get(node).base().hash() as usize & mask;
            while self.slots[idx] != Slot::Empty {
                idx = (idx + 1) & mask;
            }
            self.slots[idx] = Slot::Occupied(node);
        }
        self.tombstones = 0;
    }
}

#[cfg(test)]
mod tests {
    use larder_common::ttl::TtlDisabled;
    use larder_intrusive::arena::{Link, Linked};

    use super::*;
    use crate::node::BaseNode;

    #[derive(Default)]
    struct TestNode {
        base: BaseNode<u64, u64, TtlDisabled>,
    }

    impl Linked for TestNode {
        fn link(&self) -> &Link {
            self.base.link()
        }

        fn link_mut(&mut self) -> &mut Link {
            self.base.link_mut()
        }
    }

    impl Node for TestNode {
        type Key = u64;
        type Value = u64;
        type Ttl = TtlDisabled;

        fn base(&self) -> &BaseNode<u64, u64, TtlDisabled> {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BaseNode<u64, u64, TtlDisabled> {
            &mut self.base
        }
    }

    fn release(indexer: &mut HashIndexer<TestNode>, arena: &mut Arena<TestNode>, key: u64) -> bool {
        match indexer.remove(arena, key, &key) {
            Some(node) => {
                arena.get_mut(node).base_mut().reset();
                arena.release(node);
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_get_or_insert() {
        let mut arena: Arena<TestNode> = Arena::with_capacity(4);
        let mut indexer: HashIndexer<TestNode> = HashIndexer::with_capacity(3, 60);

        let first = indexer.get_or_insert(&mut arena, 7, 7);
        assert!(!first.found_existing);
        assert_eq!(indexer.len(), 1);
        assert_eq!(arena.live(), 1);

        let again = indexer.get_or_insert(&mut arena, 7, 7);
        assert!(again.found_existing);
        assert_eq!(again.node, first.node);
        // No spurious acquisition on the hit.
        assert_eq!(arena.live(), 1);

        assert_eq!(indexer.get(&arena, 7, &7), Some(first.node));
        assert_eq!(indexer.get(&arena, 8, &8), None);
    }

    #[test]
    fn test_remove_and_tombstone_purge() {
        let mut arena: Arena<TestNode> = Arena::with_capacity(64);
        let mut indexer: HashIndexer<TestNode> = HashIndexer::with_capacity(63, 60);

        // Churn far past the tombstone threshold; lookups must stay exact.
        for round in 0u64..16 {
            for key in 0u64..48 {
                let key = round * 1000 + key;
                indexer.get_or_insert(&mut arena, key, key);
            }
            for key in 0u64..48 {
                let key = round * 1000 + key;
                assert!(release(&mut indexer, &mut arena, key), "key {key} lost");
                assert!(!release(&mut indexer, &mut arena, key));
            }
        }
        assert_eq!(indexer.len(), 0);
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_remove_node_by_identity() {
        let mut arena: Arena<TestNode> = Arena::with_capacity(4);
        let mut indexer: HashIndexer<TestNode> = HashIndexer::with_capacity(3, 60);

        let gop = indexer.get_or_insert(&mut arena, 42, 42);
        indexer.remove_node(&mut arena, gop.node);
        assert_eq!(indexer.len(), 0);
        assert_eq!(indexer.get(&arena, 42, &42), None);
        assert!(!arena.get(gop.node).base().is_in_index());
    }

    #[test]
    fn test_growth_keeps_entries() {
        let mut arena: Arena<TestNode> = Arena::with_capacity(1);
        let mut indexer: HashIndexer<TestNode> = HashIndexer::with_capacity(0, 60);

        for key in 0u64..512 {
            indexer.get_or_insert(&mut arena, key.wrapping_mul(0x9e3779b97f4a7c15), key);
        }
        assert_eq!(indexer.len(), 512);
        for key in 0u64..512 {
            assert!(indexer.contains(&arena, key.wrapping_mul(0x9e3779b97f4a7c15), &key));
        }
    }
}
