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

//! Key hashing.
//!
//! Every public cache operation hashes its key exactly once and threads the
//! 64-bit result through shard routing, the hash index, and (for W-TinyLFU)
//! the frequency sketch. Byte-string keys hash their bytes, integer keys
//! their raw representation, and structural keys hash field by field via the
//! standard [`Hash`] machinery.

use std::hash::{BuildHasher, Hash};

/// The default hash builder, a fast non-cryptographic 64-bit hasher.
pub type DefaultHashBuilder = ahash::RandomState;

/// Hashes `key` once with `hash_builder`.
pub fn hash_one<S, Q>(hash_builder: &S, key: &Q) -> u64
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    hash_builder.hash_one(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_per_builder() {
        let s = DefaultHashBuilder::default();
        assert_eq!(hash_one(&s, "moved to a warmer shelf"), hash_one(&s, "moved to a warmer shelf"));
        assert_eq!(hash_one(&s, &42u64), hash_one(&s, &42u64));
    }
}
