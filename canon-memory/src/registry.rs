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

use std::{borrow::Borrow, hash::Hash};

use canon_common::{
    code::{Key, Reference},
    kind::Kind,
    strict_assert,
};
use imbl::{HashMap, HashSet};

/// A direction-reversed edge recording that an entity depends on another entity.
///
/// E.g. a collection depends on the tracks it contains through the references its rows subscribed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency<R> {
    /// Kind of the entity depended on.
    pub kind: Kind,
    /// Reference the dependent entity holds on it.
    pub reference: R,
}

impl<R> Dependency<R> {
    /// Create a dependency edge.
    pub fn new(kind: Kind, reference: R) -> Self {
        Self { kind, reference }
    }
}

/// Result of removing a subscriber that was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribed<K> {
    /// Id the reference was removed from.
    pub id: K,
    /// True if the subscriber set of `id` became empty.
    pub orphaned: bool,
}

/// Tracks the references subscribed to every entity and the dependency edges between entities.
///
/// Subscribers are sets of references rather than counters, so subscribing or unsubscribing twice is idempotent.
/// Empty subscriber sets are never kept.
///
/// All maps and sets are persistent, so a snapshot clones the registry in `O(1)` and shares every set it does not
/// touch with the snapshot it was derived from.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry<K, R>
where
    K: Key,
    R: Reference,
{
    subscribers: HashMap<K, HashSet<R>>,
    references: HashMap<R, K>,
    dependencies: HashMap<K, HashSet<Dependency<R>>>,
}

impl<K, R> Default for SubscriptionRegistry<K, R>
where
    K: Key,
    R: Reference,
{
    fn default() -> Self {
        Self {
            subscribers: HashMap::default(),
            references: HashMap::default(),
            dependencies: HashMap::default(),
        }
    }
}

impl<K, R> SubscriptionRegistry<K, R>
where
    K: Key,
    R: Reference,
{
    /// Subscribe `reference` to `id`.
    ///
    /// A reference maps to one id at a time. A reference already mapped to another id is re-pointed and leaves the
    /// subscriber set of its previous id.
    pub(crate) fn add_subscriber(&mut self, id: K, reference: R) {
        if let Some(previous) = self.references.insert(reference.clone(), id.clone()) {
            if previous != id {
                self.detach(&previous, &reference);
            }
        }
        self.subscribers.entry(id).or_insert_with(HashSet::default).insert(reference);
    }

    /// Unsubscribe `reference`.
    ///
    /// If `id` is omitted it is resolved through the reference map. Unknown references are a no-op.
    ///
    /// If `id` is given but the reference currently maps to another id, only the subscriber set of `id` is touched
    /// and the mapping is kept.
    pub(crate) fn remove_subscriber(&mut self, reference: &R, id: Option<&K>) -> Option<Unsubscribed<K>> {
        let target = self.references.get(reference).cloned();
        let id = match (id, target.as_ref()) {
            (Some(id), _) => id.clone(),
            (None, Some(target)) => target.clone(),
            (None, None) => return None,
        };
        if target.as_ref() == Some(&id) {
            self.references.remove(reference);
        }
        self.detach(&id, reference).map(|orphaned| Unsubscribed { id, orphaned })
    }

    /// Remove `reference` from the subscriber set of `id`.
    ///
    /// Returns `None` if it was not subscribed, otherwise whether the set became empty.
    fn detach(&mut self, id: &K, reference: &R) -> Option<bool> {
        let set = self.subscribers.get_mut(id)?;
        if set.remove(reference).is_none() {
            return None;
        }
        let orphaned = set.is_empty();
        if orphaned {
            self.subscribers.remove(id);
        }
        Some(orphaned)
    }

    /// Add dependency edges to `id`, keeping the existing ones.
    pub(crate) fn add_dependencies(&mut self, id: K, dependencies: impl IntoIterator<Item = Dependency<R>>) {
        let mut dependencies = dependencies.into_iter().peekable();
        if dependencies.peek().is_none() {
            return;
        }
        let set = self.dependencies.entry(id).or_insert_with(HashSet::default);
        for dependency in dependencies {
            set.insert(dependency);
        }
    }

    /// Replace the dependency edges of `id`.
    pub(crate) fn replace_dependencies(&mut self, id: K, dependencies: impl IntoIterator<Item = Dependency<R>>) {
        let mut set: HashSet<Dependency<R>> = HashSet::default();
        for dependency in dependencies {
            set.insert(dependency);
        }
        if set.is_empty() {
            self.dependencies.remove(&id);
        } else {
            self.dependencies.insert(id, set);
        }
    }

    /// Drop every subscriber and dependency edge of `id`, and every reference mapped to it.
    ///
    /// Returns the dropped references and dependency edges.
    pub(crate) fn purge<Q>(&mut self, id: &Q) -> (HashSet<R>, HashSet<Dependency<R>>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let subscribers = self.subscribers.remove(id).unwrap_or_default();
        for reference in subscribers.iter() {
            let target = self.references.remove(reference);
            strict_assert!(target.as_ref().is_some_and(|target| <K as Borrow<Q>>::borrow(target) == id));
        }
        let dependencies = self.dependencies.remove(id).unwrap_or_default();
        (subscribers, dependencies)
    }

    /// Get the references subscribed to `id`.
    pub fn subscribers_of<Q>(&self, id: &Q) -> Option<&HashSet<R>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.subscribers.get(id)
    }

    /// Count of references subscribed to `id`.
    pub fn subscriber_count<Q>(&self, id: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.subscribers.get(id).map(|set| set.len()).unwrap_or_default()
    }

    /// Returns true if at least one reference is subscribed to `id`.
    pub fn is_subscribed<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.subscribers.contains_key(id)
    }

    /// Get the dependency edges of `id`.
    pub fn dependencies_of<Q>(&self, id: &Q) -> Option<&HashSet<Dependency<R>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.dependencies.get(id)
    }

    /// Get the id `reference` is subscribed to.
    pub fn target_of<Q>(&self, reference: &Q) -> Option<&K>
    where
        R: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.references.get(reference)
    }

    /// Returns true if `id` has subscribers or dependency edges.
    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.subscribers.contains_key(id) || self.dependencies.contains_key(id)
    }

    /// Count of live references.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Iterate over live references and the ids they are subscribed to.
    pub fn references(&self) -> impl Iterator<Item = (&R, &K)> {
        self.references.iter()
    }

    /// Returns true if the reference map and the subscriber sets mirror each other and no subscriber set is empty.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .references
            .iter()
            .all(|(reference, id)| self.subscribers.get(id).is_some_and(|set| set.contains(reference)));
        let backward = self.subscribers.iter().all(|(id, set)| {
            !set.is_empty() && set.iter().all(|reference| self.references.get(reference) == Some(id))
        });
        forward && backward
    }
}
