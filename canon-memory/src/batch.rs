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

//! Batch inputs and outcomes of the lifecycle operations.

use canon_common::{event::Anomaly, kind::Kind};

use crate::{entry::Metadata, registry::Dependency};

/// An item of an `add` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AddEntry<K, R> {
    /// Entity id.
    pub id: K,
    /// Reference subscribed to `id`, even if the write turns out stale.
    pub reference: R,
    /// Incoming metadata.
    pub metadata: Metadata,
    /// Explicit ordering token. Read from the metadata if absent.
    pub ordering_token: Option<u64>,
    /// Replace the stored metadata instead of merging into it.
    pub replace: bool,
}

impl<K, R> AddEntry<K, R> {
    /// Create an `add` item that merges into the stored metadata.
    pub fn new(id: K, reference: R, metadata: Metadata) -> Self {
        Self {
            id,
            reference,
            metadata,
            ordering_token: None,
            replace: false,
        }
    }

    /// Set an explicit ordering token.
    pub fn with_ordering_token(mut self, ordering_token: u64) -> Self {
        self.ordering_token = Some(ordering_token);
        self
    }

    /// Replace the stored metadata instead of merging into it.
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// An item of an `update` or `increment` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry<K> {
    /// Entity id.
    pub id: K,
    /// Partial metadata.
    pub metadata: Metadata,
}

impl<K> UpdateEntry<K> {
    /// Create an `update` or `increment` item.
    pub fn new(id: K, metadata: Metadata) -> Self {
        Self { id, metadata }
    }
}

/// An item of a `subscribe` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription<K, R> {
    /// Entity id.
    pub id: K,
    /// Reference to subscribe.
    pub reference: R,
}

impl<K, R> Subscription<K, R> {
    /// Create a `subscribe` item.
    pub fn new(id: K, reference: R) -> Self {
        Self { id, reference }
    }
}

/// An item of an `unsubscribe` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscription<K, R> {
    /// Reference to unsubscribe.
    pub reference: R,
    /// Entity id, resolved through the reference map if absent.
    pub id: Option<K>,
}

impl<K, R> Unsubscription<K, R> {
    /// Unsubscribe a reference from whatever id it is subscribed to.
    pub fn new(reference: R) -> Self {
        Self { reference, id: None }
    }

    /// Unsubscribe a reference from the given id.
    pub fn with_id(mut self, id: K) -> Self {
        self.id = Some(id);
        self
    }
}

/// Dependency edges of an entity, used by `update` (extend) and `replace_dependencies` (replace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyUpdate<K, R> {
    /// Dependent entity id.
    pub id: K,
    /// Edges of `id`.
    pub dependencies: Vec<Dependency<R>>,
}

impl<K, R> DependencyUpdate<K, R> {
    /// Create dependency edges from `id` to the entities of `kind` held through `references`.
    pub fn new(id: K, kind: Kind, references: impl IntoIterator<Item = R>) -> Self {
        let dependencies = references
            .into_iter()
            .map(|reference| Dependency::new(kind, reference))
            .collect();
        Self { id, dependencies }
    }

    /// Add edges to the entities of `kind` held through `references`.
    pub fn with(mut self, kind: Kind, references: impl IntoIterator<Item = R>) -> Self {
        self.dependencies
            .extend(references.into_iter().map(|reference| Dependency::new(kind, reference)));
        self
    }
}

/// A dropped `add` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleWrite<K> {
    /// Entity id.
    pub id: K,
    /// Ordering token of the stored entry.
    pub current: u64,
    /// Ordering token of the dropped write.
    pub incoming: u64,
}

/// Outcome of an `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome<K> {
    /// Ids whose metadata was written, in batch order.
    pub applied: Vec<K>,
    /// Items whose metadata was dropped. Their references are subscribed anyway.
    pub stale: Vec<StaleWrite<K>>,
}

impl<K> Default for AddOutcome<K> {
    fn default() -> Self {
        Self {
            applied: vec![],
            stale: vec![],
        }
    }
}

/// Outcome of an `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeOutcome<K> {
    /// Ids whose subscriber set became empty.
    pub orphaned: Vec<K>,
}

impl<K> Default for UnsubscribeOutcome<K> {
    fn default() -> Self {
        Self { orphaned: vec![] }
    }
}

/// Outcome of a `commit_removal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome<K> {
    /// Ids that were deleted.
    pub removed: Vec<K>,
    /// Ids that were not deleted, or had nothing to delete.
    pub anomalies: Vec<(K, Anomaly)>,
}

impl<K> Default for RemovalOutcome<K> {
    fn default() -> Self {
        Self {
            removed: vec![],
            anomalies: vec![],
        }
    }
}

impl<K> RemovalOutcome<K> {
    /// Returns true if nothing was deleted and no anomaly was observed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.anomalies.is_empty()
    }
}
