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

//! Arena-backed intrusive data structures for the larder cache.
//!
//! Nodes live in an [`arena::Arena`] and are addressed by 32-bit
//! [`arena::NodeRef`] handles instead of heap pointers; the links of the
//! intrusive [`dlist::Dlist`] are embedded in the nodes themselves. Handles
//! stay stable for the lifetime of the arena, which keeps every list
//! operation O(1) without any unsafe pointer juggling.

pub mod arena;
pub mod dlist;
