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

/// Construction-time configuration failures.
///
/// Cache operations themselves are infallible: lookups never allocate, and
/// allocation failure on insert follows the global allocator's abort
/// behavior. Internal invariant violations are assertions, not errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cache capacity must be positive")]
    ZeroCapacity,
    #[error("shard count must be positive")]
    ZeroShards,
    #[error("max load percentage must be in (0, 100], got {0}")]
    InvalidMaxLoad(u8),
    #[error("count-min sketch depth must be positive")]
    ZeroSketchDepth,
    #[error("{name} must be in [1, 100], got {value}")]
    InvalidPercent { name: &'static str, value: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;
