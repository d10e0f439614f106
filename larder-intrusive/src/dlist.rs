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

use larder_common::{strict_assert, strict_assert_eq};

use crate::arena::{Arena, Link, Linked, NodeRef};

/// Intrusive doubly-linked list over nodes in an [`Arena`].
///
/// The list stores only the head, tail and length; the links live in the
/// nodes. A node may be a member of at most one list at a time, and the
/// caller is responsible for passing the arena the node belongs to.
pub struct Dlist<N> {
    head: Option<NodeRef>,
    tail: Option<NodeRef>,
    len: usize,
    _marker: PhantomData<fn(N)>,
}

impl<N> Default for Dlist<N> {
    fn default() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _marker: PhantomData,
        }
    }
}

impl<N> Dlist<N>
where
    N: Linked,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<NodeRef> {
        self.head
    }

    pub fn back(&self) -> Option<NodeRef> {
        self.tail
    }

    pub fn prev(&self, arena: &Arena<N>, node: NodeRef) -> Option<NodeRef> {
        arena.get(node).link().prev()
    }

    pub fn next(&self, arena: &Arena<N>, node: NodeRef) -> Option<NodeRef> {
        arena.get(node).link().next()
    }

    /// Appends `node` at the tail.
    pub fn push_back(&mut self, arena: &mut Arena<N>, node: NodeRef) {
        strict_assert!(!arena.get(node).link().is_linked());
        match self.tail {
            Some(tail) => {
                arena.get_mut(tail).link_mut().set_next(Some(node));
                arena.get_mut(node).link_mut().set_prev(Some(tail));
            }
            None => {
                strict_assert!(self.head.is_none());
                self.head = Some(node);
            }
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Prepends `node` at the head.
    pub fn push_front(&mut self, arena: &mut Arena<N>, node: NodeRef) {
        strict_assert!(!arena.get(node).link().is_linked());
        match self.head {
            Some(head) => {
                arena.get_mut(head).link_mut().set_prev(Some(node));
                arena.get_mut(node).link_mut().set_next(Some(head));
            }
            None => {
                strict_assert!(self.tail.is_none());
                self.tail = Some(node);
            }
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Links `node` immediately after `anchor`.
    pub fn insert_after(&mut self, arena: &mut Arena<N>, anchor: NodeRef, node: NodeRef) {
        strict_assert!(!arena.get(node).link().is_linked());
        strict_assert!(self.len > 0);
        match arena.get(anchor).link().next() {
            Some(next) => {
                arena.get_mut(next).link_mut().set_prev(Some(node));
                arena.get_mut(node).link_mut().set_next(Some(next));
                arena.get_mut(node).link_mut().set_prev(Some(anchor));
                arena.get_mut(anchor).link_mut().set_next(Some(node));
                self.len += 1;
            }
            None => {
                strict_assert_eq!(self.tail, Some(anchor));
                self.push_back(arena, node);
            }
        }
    }

    /// Links `node` immediately before `anchor`.
    pub fn insert_before(&mut self, arena: &mut Arena<N>, anchor: NodeRef, node: NodeRef) {
        strict_assert!(!arena.get(node).link().is_linked());
        strict_assert!(self.len > 0);
        match arena.get(anchor).link().prev() {
            Some(prev) => {
                arena.get_mut(prev).link_mut().set_next(Some(node));
                arena.get_mut(node).link_mut().set_prev(Some(prev));
                arena.get_mut(node).link_mut().set_next(Some(anchor));
                arena.get_mut(anchor).link_mut().set_prev(Some(node));
                self.len += 1;
            }
            None => {
                strict_assert_eq!(self.head, Some(anchor));
                self.push_front(arena, node);
            }
        }
    }

    /// Unlinks `node`, which must be a member of this list.
    pub fn remove(&mut self, arena: &mut Arena<N>, node: NodeRef) {
        strict_assert!(self.len > 0);
        let link = *arena.get(node).link();
        strict_assert!(link.prev() != Some(node), "node must not be its own neighbor");
        strict_assert!(link.next() != Some(node), "node must not be its own neighbor");

        match link.prev() {
            Some(prev) => arena.get_mut(prev).link_mut().set_next(link.next()),
            None => {
                strict_assert_eq!(self.head, Some(node));
                self.head = link.next();
            }
        }
        match link.next() {
            Some(next) => arena.get_mut(next).link_mut().set_prev(link.prev()),
            None => {
                strict_assert_eq!(self.tail, Some(node));
                self.tail = link.prev();
            }
        }
        *arena.get_mut(node).link_mut() = Link::default();
        self.len -= 1;
    }

    pub fn pop_front(&mut self, arena: &mut Arena<N>) -> Option<NodeRef> {
        let node = self.head?;
        self.remove(arena, node);
        Some(node)
    }

    pub fn pop_back(&mut self, arena: &mut Arena<N>) -> Option<NodeRef> {
        let node = self.tail?;
        self.remove(arena, node);
        Some(node)
    }

    /// Unlinks `node` and re-appends it at the tail.
    pub fn move_to_back(&mut self, arena: &mut Arena<N>, node: NodeRef) {
        if self.tail == Some(node) {
            return;
        }
        self.remove(arena, node);
        self.push_back(arena, node);
    }

    /// Head-to-tail iterator of node handles.
    pub fn iter<'a>(&'a self, arena: &'a Arena<N>) -> Iter<'a, N> {
        Iter {
            arena,
            cursor: self.head,
        }
    }
}

pub struct Iter<'a, N> {
    arena: &'a Arena<N>,
    cursor: Option<NodeRef>,
}

impl<N> Iterator for Iter<'_, N>
where
    N: Linked,
{
    type Item = NodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor?;
        self.cursor = self.arena.get(node).link().next();
        Some(node)
    }
}
