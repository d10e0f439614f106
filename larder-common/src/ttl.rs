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

//! Type-level switch for per-entry time-to-live support.
//!
//! TTL support is selected when the cache type is instantiated. With
//! [`TtlDisabled`] (the default) nodes carry no expiry storage at all and
//! `put_with_ttl` does not exist on the cache type, so calling it is a
//! compile-time error. Expiration is enforced at access time only; there is
//! no background sweeper.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Expiry storage carried by every cache node.
pub trait Expiry: Copy + Default + Send + Sync + 'static {
    /// Whether an entry with this expiry is dead at `now_millis`.
    fn is_expired(&self, now_millis: u64) -> bool;
}

/// Compile-time TTL configuration.
pub trait TtlMode: Send + Sync + 'static {
    /// Whether access paths need to consult the clock at all.
    const ENABLED: bool;

    type Expiry: Expiry;
}

/// Marker: entries may carry a deadline in milliseconds since the epoch.
pub enum TtlEnabled {}

/// Marker: no expiry storage, no TTL operations.
pub enum TtlDisabled {}

impl TtlMode for TtlEnabled {
    const ENABLED: bool = true;

    type Expiry = Option<u64>;
}

impl TtlMode for TtlDisabled {
    const ENABLED: bool = false;

    type Expiry = ();
}

impl Expiry for Option<u64> {
    fn is_expired(&self, now_millis: u64) -> bool {
        matches!(self, Some(at) if now_millis >= *at)
    }
}

impl Expiry for () {
    fn is_expired(&self, _: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        assert!(!().is_expired(u64::MAX));
        assert!(!None::<u64>.is_expired(u64::MAX));
        assert!(Some(100u64).is_expired(100));
        assert!(Some(100u64).is_expired(101));
        assert!(!Some(100u64).is_expired(99));
    }

    #[test]
    fn test_now_millis_advances() {
        let a = now_millis();
        std::thread::sleep(Duration::from_millis(2));
        assert!(now_millis() > a);
    }
}
