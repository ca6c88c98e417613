//  Copyright 2026 canon Project Authors
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

//! canon - normalized entity cache for Rust.
//!
//! canon keeps one canonical copy of every domain entity (tracks, users, collections), shared by any number of
//! short-lived views. Views subscribe to entities through caller-minted references. An entity stays cached while
//! any reference is subscribed to it, and becomes an eviction candidate as soon as the last one leaves.
//!
//! See [`EntityCaches`] for the per-kind set of caches, and [`Cache`] for a single cache.

use canon_common as common;
use canon_memory as memory;

mod caches;
pub mod prelude;
pub mod presets;

pub use prelude::*;
