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

use std::fmt::{self, Debug};
use std::num::NonZeroU32;

use larder_common::strict_assert;

/// Stable handle to a slot in an [`Arena`].
///
/// Stored with a `+1` offset so the niche keeps `Option<NodeRef>` at four
/// bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(NonZeroU32);

impl NodeRef {
    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index + 1).expect("arena slot count exceeds u32");
        // `index + 1` cannot be zero.
        Self(NonZeroU32::new(raw).expect("offset node index is non-zero"))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.index())
    }
}

/// Link pair embedded in every arena node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    prev: Option<NodeRef>,
    next: Option<NodeRef>,
}

impl Link {
    pub fn prev(&self) -> Option<NodeRef> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeRef> {
        self.next
    }

    pub fn set_prev(&mut self, prev: Option<NodeRef>) {
        self.prev = prev;
    }

    pub fn set_next(&mut self, next: Option<NodeRef>) {
        self.next = next;
    }

    /// Whether either link is set. A node that is the sole member of a list
    /// has both links unset, so this is not a membership test.
    pub fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

/// A node type that embeds a [`Link`].
pub trait Linked {
    fn link(&self) -> &Link;

    fn link_mut(&mut self) -> &mut Link;
}

/// Preallocated pool of nodes with a LIFO free list.
///
/// `acquire` pops the most recently released slot; when the free list is
/// empty the arena grows by one slot, so a transient demand spike beyond the
/// preallocation degrades to ordinary allocation instead of failing. Slots
/// are recycled through the free list and returned to the allocator only
/// when the arena is dropped.
pub struct Arena<N> {
    slots: Vec<N>,
    free: Vec<NodeRef>,
}

impl<N> Arena<N>
where
    N: Default + Linked,
{
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, N::default);
        let free = (0..capacity).rev().map(NodeRef::from_index).collect();
        Self { slots, free }
    }

    pub fn acquire(&mut self) -> NodeRef {
        match self.free.pop() {
            Some(node) => node,
            None => {
                self.slots.push(N::default());
                NodeRef::from_index(self.slots.len() - 1)
            }
        }
    }
}

impl<N> Arena<N>
where
    N: Linked,
{
    pub fn release(&mut self, node: NodeRef) {
        strict_assert!(!self.slots[node.index()].link().is_linked());
        self.free.push(node);
    }

    pub fn get(&self, node: NodeRef) -> &N {
        &self.slots[node.index()]
    }

    pub fn get_mut(&mut self, node: NodeRef) -> &mut N {
        &mut self.slots[node.index()]
    }

    /// Slots handed out and not yet released.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Total slots owned by the arena, preallocated or grown.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Slots on the free list.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TestNode {
        link: Link,
        id: u64,
    }

    impl Linked for TestNode {
        fn link(&self) -> &Link {
            &self.link
        }

        fn link_mut(&mut self) -> &mut Link {
            &mut self.link
        }
    }

    #[test]
    fn test_option_node_ref_is_small() {
        assert_eq!(std::mem::size_of::<Option<NodeRef>>(), 4);
    }

    #[test]
    fn test_acquire_release_accounting() {
        let mut arena: Arena<TestNode> = Arena::with_capacity(2);
        assert_eq!(arena.allocated(), 2);
        assert_eq!(arena.available(), 2);
        assert_eq!(arena.live(), 0);

        let a = arena.acquire();
        let b = arena.acquire();
        arena.get_mut(a).id = 1;
        arena.get_mut(b).id = 2;
        assert_eq!(arena.live(), 2);
        assert_eq!(arena.available(), 0);

        // Overflow acquisition grows the arena.
        let c = arena.acquire();
        assert_eq!(arena.allocated(), 3);
        assert_eq!(arena.live(), 3);

        arena.release(b);
        arena.release(c);
        arena.release(a);
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.available(), 3);

        // LIFO reuse: the most recently released slot comes back first.
        assert_eq!(arena.acquire(), a);
        assert_eq!(arena.get(a).id, 1);
    }
}
