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

pub use larder_common::code::{HashBuilder, Key, Value};
pub use larder_common::hash::DefaultHashBuilder;
pub use larder_common::sync::{MultiThread, SingleThread, ThreadModel};
pub use larder_common::ttl::{TtlDisabled, TtlEnabled, TtlMode};

pub use crate::cache::{Cache, CacheBuilder, EvictionConfig};
pub use crate::error::{Error, Result};
pub use crate::eviction::fifo::FifoConfig;
pub use crate::eviction::lru::LruConfig;
pub use crate::eviction::s3fifo::S3FifoConfig;
pub use crate::eviction::sieve::SieveConfig;
pub use crate::eviction::tinylfu::TinyLfuConfig;
pub use crate::metrics::Metrics;
