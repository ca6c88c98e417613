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

//! In-memory normalized entity cache for canon.
//!
//! A cache holds one canonical [`Entry`] per entity id, the fetch status of every id, and the
//! set of references subscribed to every id. Every lifecycle operation publishes a new immutable
//! [`Snapshot`], so readers never observe a partially applied operation.

mod batch;
mod cache;
mod entry;
mod error;
mod merge;
mod registry;
mod snapshot;
mod store;

pub mod prelude;
pub use prelude::*;
