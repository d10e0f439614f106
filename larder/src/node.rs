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

use bitflags::bitflags;
use larder_common::code::{Key, Value};
use larder_common::strict_assert;
use larder_common::ttl::{Expiry, TtlMode};
use larder_intrusive::arena::{Link, Linked};

bitflags! {
    /// Where the node currently is, used to check the index/list agreement
    /// invariants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const IN_INDEX = 0b01;
        const IN_LIST = 0b10;
    }
}

/// Storage cell shared by all eviction policies.
///
/// A node is either vacant (owned by the arena free list), or occupied and
/// reachable from both the hash index and exactly one policy list. Policies
/// wrap `BaseNode` in their own node types to add per-policy payload.
pub struct BaseNode<K, V, T>
where
    T: TtlMode,
{
    hash: u64,
    key: Option<K>,
    value: Option<V>,
    expiry: T::Expiry,
    link: Link,
    flags: NodeFlags,
}

impl<K, V, T> Default for BaseNode<K, V, T>
where
    T: TtlMode,
{
    fn default() -> Self {
        Self {
            hash: 0,
            key: None,
            value: None,
            expiry: T::Expiry::default(),
            link: Link::default(),
            flags: NodeFlags::empty(),
        }
    }
}

impl<K, V, T> BaseNode<K, V, T>
where
    K: Key,
    V: Value,
    T: TtlMode,
{
    /// Claims a vacant node for `key`. The value arrives with the following
    /// [`update`](Self::update).
    pub fn init(&mut self, hash: u64, key: K) {
        strict_assert!(self.key.is_none());
        strict_assert!(self.value.is_none());
        strict_assert!(self.flags.is_empty());
        self.hash = hash;
        self.key = Some(key);
    }

    /// Overwrites the value and expiry, on both insertion and replacement.
    pub fn update(&mut self, value: V, expiry: T::Expiry) {
        self.value = Some(value);
        self.expiry = expiry;
    }

    /// Drops the entry payload, leaving the node vacant for the arena.
    pub fn reset(&mut self) {
        strict_assert!(self.flags.is_empty());
        strict_assert!(!self.link.is_linked());
        self.hash = 0;
        self.key = None;
        self.value = None;
        self.expiry = T::Expiry::default();
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn key(&self) -> &K {
        self.key.as_ref().expect("node is vacant")
    }

    pub fn value(&self) -> &V {
        self.value.as_ref().expect("node has no value")
    }

    /// Drops the value only, keeping the key indexed (S3-FIFO ghosts).
    pub fn clear_value(&mut self) {
        self.value = None;
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expiry.is_expired(now_millis)
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn is_in_index(&self) -> bool {
        self.flags.contains(NodeFlags::IN_INDEX)
    }

    pub fn is_in_list(&self) -> bool {
        self.flags.contains(NodeFlags::IN_LIST)
    }

    pub fn set_in_index(&mut self, in_index: bool) {
        self.flags.set(NodeFlags::IN_INDEX, in_index);
    }

    pub fn set_in_list(&mut self, in_list: bool) {
        self.flags.set(NodeFlags::IN_LIST, in_list);
    }
}

/// A policy node wrapping a [`BaseNode`].
pub trait Node: Default + Linked {
    type Key: Key;
    type Value: Value;
    type Ttl: TtlMode;

    fn base(&self) -> &BaseNode<Self::Key, Self::Value, Self::Ttl>;

    fn base_mut(&mut self) -> &mut BaseNode<Self::Key, Self::Value, Self::Ttl>;
}
