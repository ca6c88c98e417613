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

use std::{
    borrow::Borrow,
    hash::Hash,
    time::{Duration, Instant},
};

use canon_common::{
    code::{Key, Reference},
    event::Anomaly,
};
use imbl::HashSet;

use crate::{
    batch::{
        AddEntry, AddOutcome, DependencyUpdate, RemovalOutcome, StaleWrite, Subscription, UnsubscribeOutcome,
        Unsubscription, UpdateEntry,
    },
    entry::{Entry, Metadata, Status, Timestamp},
    merge::{merge, MergeMode, MergePolicy},
    registry::{Dependency, SubscriptionRegistry},
    store::EntryStore,
};

/// Default metadata field an ordering token is read from.
pub const DEFAULT_ORDERING_FIELD: &str = "blocknumber";
/// Default age after which an entry is considered stale.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(5 * 60);

/// How writes are merged and ordered.
#[derive(Debug, Clone)]
pub(crate) struct WriteRules {
    pub(crate) merge_policy: MergePolicy,
    pub(crate) ordering_field: String,
}

impl Default for WriteRules {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            ordering_field: DEFAULT_ORDERING_FIELD.to_string(),
        }
    }
}

impl WriteRules {
    fn token_of(&self, metadata: &Metadata) -> Option<u64> {
        metadata.get(&self.ordering_field).and_then(|value| value.as_u64())
    }
}

/// An immutable, self-consistent view of the whole cache.
///
/// Lifecycle operations never mutate a published snapshot. They derive the next snapshot from a copy of the
/// current one, so a reader holding a snapshot sees either all or nothing of an operation. The copy is cheap: every
/// map and set is persistent, and the next snapshot shares all untouched nodes with the current one.
#[derive(Debug, Clone)]
pub struct Snapshot<K, R>
where
    K: Key,
    R: Reference,
{
    store: EntryStore<K>,
    registry: SubscriptionRegistry<K, R>,
    prune: HashSet<K>,
    entry_ttl: Duration,
}

impl<K, R> Default for Snapshot<K, R>
where
    K: Key,
    R: Reference,
{
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_TTL)
    }
}

impl<K, R> Snapshot<K, R>
where
    K: Key,
    R: Reference,
{
    pub(crate) fn new(entry_ttl: Duration) -> Self {
        Self {
            store: EntryStore::default(),
            registry: SubscriptionRegistry::default(),
            prune: HashSet::default(),
            entry_ttl,
        }
    }

    /// Get the entry of `id`.
    pub fn get<Q>(&self, id: &Q) -> Option<&Entry>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get(id).map(|entry| entry.as_ref())
    }

    /// Get the fetch status of `id`, [`Status::Unknown`] if none is recorded.
    pub fn get_status<Q>(&self, id: &Q) -> Status
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get_status(id)
    }

    /// Iterate over the references subscribed to `id`.
    pub fn subscribers_of<Q>(&self, id: &Q) -> impl Iterator<Item = &R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.subscribers_of(id).into_iter().flatten()
    }

    /// Iterate over the dependency edges of `id`.
    pub fn dependencies_of<Q>(&self, id: &Q) -> impl Iterator<Item = &Dependency<R>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.dependencies_of(id).into_iter().flatten()
    }

    /// Get the id `reference` is subscribed to.
    pub fn reference_target<Q>(&self, reference: &Q) -> Option<&K>
    where
        R: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.target_of(reference)
    }

    /// Returns true if `id` is marked for removal and not yet removed.
    pub fn is_pending_prune<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.prune.contains(id)
    }

    /// Iterate over the ids marked for removal.
    pub fn pending_prune(&self) -> impl Iterator<Item = &K> {
        self.prune.iter()
    }

    /// Count of ids marked for removal.
    pub fn pending_prune_len(&self) -> usize {
        self.prune.len()
    }

    /// Iterate over the ids that hold an entry but have no subscriber. These are the eviction candidates.
    pub fn unsubscribed(&self) -> impl Iterator<Item = &K> {
        self.store
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !self.registry.is_subscribed(*id))
    }

    /// Returns true if `id` holds an entry that is expired or older than the entry ttl at `now`.
    pub fn is_stale<Q>(&self, id: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store
            .get(id)
            .is_some_and(|entry| entry.timestamp().is_stale(now, self.entry_ttl))
    }

    /// Entry & status store of the snapshot.
    pub fn store(&self) -> &EntryStore<K> {
        &self.store
    }

    /// Subscription registry of the snapshot.
    pub fn registry(&self) -> &SubscriptionRegistry<K, R> {
        &self.registry
    }

    /// Count of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns true if no reference dangles.
    pub fn is_consistent(&self) -> bool {
        self.registry.is_consistent()
    }

    pub(crate) fn add(&mut self, batch: Vec<AddEntry<K, R>>, rules: &WriteRules, now: Instant) -> AddOutcome<K> {
        let mut outcome = AddOutcome::default();
        let mut writes = Vec::with_capacity(batch.len());

        for AddEntry {
            id,
            reference,
            metadata,
            ordering_token,
            replace,
        } in batch
        {
            let old = self.store.get(&id);
            let current = old.and_then(|entry| entry.ordering_token());
            let incoming = ordering_token.or_else(|| rules.token_of(&metadata));

            match (current, incoming) {
                (Some(current), Some(incoming)) if incoming < current => {
                    tracing::debug!("[entity cache]: drop stale write on {id:?}, current: {current}, incoming: {incoming}");
                    outcome.stale.push(StaleWrite {
                        id: id.clone(),
                        current,
                        incoming,
                    });
                }
                _ => {
                    let metadata = match replace {
                        true => metadata,
                        false => merge(
                            old.map(|entry| entry.metadata()),
                            metadata,
                            &rules.merge_policy,
                            MergeMode::Default,
                        ),
                    };
                    let token = ordering_token.or_else(|| rules.token_of(&metadata)).or(current);
                    writes.push((id.clone(), Entry::new(metadata, Timestamp::At(now), token)));
                    outcome.applied.push(id.clone());
                }
            }

            self.prune.remove(&id);
            self.registry.add_subscriber(id, reference);
        }

        self.store.apply_entries(writes);
        outcome
    }

    pub(crate) fn update(
        &mut self,
        batch: Vec<UpdateEntry<K>>,
        dependencies: Vec<DependencyUpdate<K, R>>,
        rules: &WriteRules,
        now: Instant,
    ) {
        let writes = batch
            .into_iter()
            .map(|UpdateEntry { id, metadata }| {
                let old = self.store.get(&id);
                let current = old.and_then(|entry| entry.ordering_token());
                let metadata = merge(
                    old.map(|entry| entry.metadata()),
                    metadata,
                    &rules.merge_policy,
                    MergeMode::Default,
                );
                let token = rules.token_of(&metadata).or(current);
                (id, Entry::new(metadata, Timestamp::At(now), token))
            })
            .collect::<Vec<_>>();
        self.store.apply_entries(writes);

        for DependencyUpdate { id, dependencies } in dependencies {
            self.registry.add_dependencies(id, dependencies);
        }
    }

    pub(crate) fn increment(&mut self, batch: Vec<UpdateEntry<K>>, rules: &WriteRules, now: Instant) {
        let writes = batch
            .into_iter()
            .map(|UpdateEntry { id, metadata }| {
                let old = self.store.get(&id);
                let token = old.and_then(|entry| entry.ordering_token());
                let metadata = merge(
                    old.map(|entry| entry.metadata()),
                    metadata,
                    &rules.merge_policy,
                    MergeMode::Additive,
                );
                (id, Entry::new(metadata, Timestamp::At(now), token))
            })
            .collect::<Vec<_>>();
        self.store.apply_entries(writes);
    }

    pub(crate) fn set_status(&mut self, batch: Vec<(K, Status)>) {
        self.store.apply_statuses(batch);
    }

    /// A subscribed id leaves the prune set, as it does on `add`.
    pub(crate) fn subscribe(&mut self, batch: Vec<Subscription<K, R>>) {
        for Subscription { id, reference } in batch {
            self.prune.remove(&id);
            self.registry.add_subscriber(id, reference);
        }
    }

    pub(crate) fn unsubscribe(&mut self, batch: Vec<Unsubscription<K, R>>) -> UnsubscribeOutcome<K> {
        let mut outcome = UnsubscribeOutcome::default();
        for Unsubscription { reference, id } in batch {
            match self.registry.remove_subscriber(&reference, id.as_ref()) {
                Some(unsubscribed) if unsubscribed.orphaned => outcome.orphaned.push(unsubscribed.id),
                Some(_) => {}
                None => tracing::debug!("[entity cache]: unsubscribe unknown reference {reference:?} (id: {id:?})"),
            }
        }
        outcome
    }

    pub(crate) fn replace_dependencies(&mut self, batch: Vec<DependencyUpdate<K, R>>) {
        for DependencyUpdate { id, dependencies } in batch {
            self.registry.replace_dependencies(id, dependencies);
        }
    }

    pub(crate) fn mark_for_removal(&mut self, ids: impl IntoIterator<Item = K>) {
        for id in ids {
            self.prune.insert(id);
        }
    }

    pub(crate) fn commit_removal(&mut self, ids: impl IntoIterator<Item = K>) -> RemovalOutcome<K> {
        let mut outcome = RemovalOutcome::default();
        for id in ids {
            if self.prune.remove(&id).is_some() {
                let (entry, status) = self.store.remove(&id);
                let (subscribers, dependencies) = self.registry.purge(&id);
                if entry.is_none() && status.is_none() && subscribers.is_empty() && dependencies.is_empty() {
                    outcome.anomalies.push((id, Anomaly::AlreadyAbsent));
                } else {
                    outcome.removed.push(id);
                }
            } else if self.store.contains(&id) || self.store.has_status(&id) || self.registry.contains(&id) {
                outcome.anomalies.push((id, Anomaly::NotMarked));
            } else {
                outcome.anomalies.push((id, Anomaly::AlreadyAbsent));
            }
        }
        outcome
    }

    /// Commit the whole prune set, except the ids that have subscribers.
    ///
    /// Those ids leave the prune set and are kept.
    pub(crate) fn sweep(&mut self) -> RemovalOutcome<K> {
        let (kept, pending): (Vec<K>, Vec<K>) = self
            .prune
            .iter()
            .cloned()
            .partition(|id| self.registry.is_subscribed(id));
        if !kept.is_empty() {
            tracing::debug!("[entity cache]: keep {} marked ids with live subscribers: {kept:?}", kept.len());
        }
        for id in kept.iter() {
            self.prune.remove(id);
        }
        self.commit_removal(pending)
    }

    /// Returns the count of entries that were marked expired.
    pub(crate) fn set_expired(&mut self, ids: impl IntoIterator<Item = K>) -> usize {
        let writes = ids
            .into_iter()
            .filter_map(|id| {
                let entry = self.store.get(&id)?.expired();
                Some((id, entry))
            })
            .collect::<Vec<_>>();
        let count = writes.len();
        self.store.apply_entries(writes);
        count
    }
}
