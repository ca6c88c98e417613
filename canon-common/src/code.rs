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

use std::{fmt::Debug, hash::Hash};

/// Bound of the stable identifier of a cached entity.
pub trait Key: Send + Sync + 'static + Hash + Eq + Clone + Debug {}
impl<T: Send + Sync + 'static + Hash + Eq + Clone + Debug> Key for T {}

/// Bound of the opaque handle a view uses to subscribe to an entity.
///
/// A reference is minted by the caller and represents one live usage of one entity, e.g. one row of one list.
pub trait Reference: Send + Sync + 'static + Hash + Eq + Clone + Debug {}
impl<T: Send + Sync + 'static + Hash + Eq + Clone + Debug> Reference for T {}
