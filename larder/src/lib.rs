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

//! Sharded in-memory cache with pluggable eviction policies.
//!
//! `larder` keeps a fixed number of entries across independently locked
//! shards, with the eviction policy selected at runtime from FIFO, LRU,
//! SIEVE, S3-FIFO and W-TinyLFU. Per-entry TTL and the threading model are
//! type-level switches that cost nothing when unused.
//!
//! ```
//! use larder::{Cache, CacheBuilder, S3FifoConfig};
//!
//! let cache: Cache<u64, String> = CacheBuilder::new(1024)
//!     .with_shards(8)
//!     .with_eviction_config(S3FifoConfig::default())
//!     .build()
//!     .unwrap();
//!
//! cache.put(1, "preserves".to_string());
//! assert_eq!(cache.get(&1), Some("preserves".to_string()));
//! ```

mod cache;
mod error;
mod eviction;
mod indexer;
mod metrics;
mod node;
mod sketch;

pub mod prelude;
pub use prelude::*;
