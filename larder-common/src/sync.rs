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

//! Type-level switch for the threading model.
//!
//! With [`MultiThread`] (the default) every shard sits behind a
//! `parking_lot` reader-writer lock and the cache is `Send + Sync`. With
//! [`SingleThread`] the lock is replaced by borrow tracking; the resulting
//! cache is `!Sync`, so sharing it across threads is rejected at compile
//! time instead of being documented as caller-managed.

use std::cell::{Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A reader-writer lock protecting one cache shard.
///
/// Guards are only ever held for the duration of a single cache operation;
/// they never escape to callers.
pub trait ShardLock<T> {
    type ReadGuard<'a>: Deref<Target = T>
    where
        Self: 'a;
    type WriteGuard<'a>: DerefMut<Target = T>
    where
        Self: 'a;

    fn new(value: T) -> Self;

    fn read(&self) -> Self::ReadGuard<'_>;

    fn write(&self) -> Self::WriteGuard<'_>;
}

impl<T> ShardLock<T> for RwLock<T> {
    type ReadGuard<'a>
        = RwLockReadGuard<'a, T>
    where
        Self: 'a;
    type WriteGuard<'a>
        = RwLockWriteGuard<'a, T>
    where
        Self: 'a;

    fn new(value: T) -> Self {
        RwLock::new(value)
    }

    fn read(&self) -> Self::ReadGuard<'_> {
        RwLock::read(self)
    }

    fn write(&self) -> Self::WriteGuard<'_> {
        RwLock::write(self)
    }
}

/// Single-thread stand-in for the shard lock.
///
/// Borrow tracking is kept so accidental reentrancy panics instead of
/// aliasing.
pub struct Unprotected<T>(RefCell<T>);

impl<T> ShardLock<T> for Unprotected<T> {
    type ReadGuard<'a>
        = Ref<'a, T>
    where
        Self: 'a;
    type WriteGuard<'a>
        = RefMut<'a, T>
    where
        Self: 'a;

    fn new(value: T) -> Self {
        Self(RefCell::new(value))
    }

    fn read(&self) -> Self::ReadGuard<'_> {
        self.0.borrow()
    }

    fn write(&self) -> Self::WriteGuard<'_> {
        self.0.borrow_mut()
    }
}

/// Compile-time threading configuration.
pub trait ThreadModel: 'static {
    type Lock<T>: ShardLock<T>;
}

/// Marker: shards behind [`parking_lot::RwLock`].
pub enum MultiThread {}

/// Marker: no locking; the cache is `!Sync` by construction.
pub enum SingleThread {}

impl ThreadModel for MultiThread {
    type Lock<T> = RwLock<T>;
}

impl ThreadModel for SingleThread {
    type Lock<T> = Unprotected<T>;
}
