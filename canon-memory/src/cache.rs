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
    fmt::Debug,
    hash::Hash,
    marker::PhantomData,
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use canon_common::{
    code::{Key, Reference},
    event::{Anomaly, Event, EventListener},
    metrics::{model::Metrics, RegistryOps},
    strict_assert,
};
use itertools::Itertools;
use parking_lot::Mutex;

use crate::{
    batch::{
        AddEntry, AddOutcome, DependencyUpdate, RemovalOutcome, Subscription, UnsubscribeOutcome, Unsubscription,
        UpdateEntry,
    },
    entry::{Entry, Status},
    error::{Error, Result},
    merge::MergePolicy,
    snapshot::{Snapshot, WriteRules, DEFAULT_ENTRY_TTL},
};

/// Default count of pending ids that triggers a batched removal.
pub const DEFAULT_PRUNE_MIN: usize = 250;

type MetricsBuilder = Box<dyn FnOnce(&'static str) -> Metrics + Send>;

/// Entity cache builder.
pub struct CacheBuilder<K, R>
where
    K: Key,
    R: Reference,
{
    name: &'static str,
    rules: WriteRules,
    prune_min: usize,
    entry_ttl: Duration,
    event_listener: Option<Arc<dyn EventListener<Key = K>>>,
    metrics: Option<MetricsBuilder>,
    _marker: PhantomData<R>,
}

impl<K, R> Default for CacheBuilder<K, R>
where
    K: Key,
    R: Reference,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, R> CacheBuilder<K, R>
where
    K: Key,
    R: Reference,
{
    /// Create an entity cache builder with the default configuration.
    pub fn new() -> Self {
        Self {
            name: "canon",
            rules: WriteRules::default(),
            prune_min: DEFAULT_PRUNE_MIN,
            entry_ttl: DEFAULT_ENTRY_TTL,
            event_listener: None,
            metrics: None,
            _marker: PhantomData,
        }
    }

    /// Set the name of the cache. The name labels the metrics and the logs of the cache.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Set the field merge policy.
    ///
    /// The default policy deep merges every field.
    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.rules.merge_policy = merge_policy;
        self
    }

    /// Set the metadata field the ordering token of an `add` is read from when no explicit token is given.
    ///
    /// The default field is `blocknumber`.
    pub fn with_ordering_field(mut self, ordering_field: impl Into<String>) -> Self {
        self.rules.ordering_field = ordering_field.into();
        self
    }

    /// Set the count of pending ids that makes [`Cache::remove`] commit the whole prune set.
    ///
    /// The default value is 250. Must be positive.
    pub fn with_prune_min(mut self, prune_min: usize) -> Self {
        self.prune_min = prune_min;
        self
    }

    /// Set the age after which an entry is considered stale.
    ///
    /// The default value is 5 minutes.
    pub fn with_entry_ttl(mut self, entry_ttl: Duration) -> Self {
        self.entry_ttl = entry_ttl;
        self
    }

    /// Set the event listener.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = K>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the metrics registry. The registry is noop by default.
    pub fn with_metrics_registry<M>(mut self, registry: M) -> Self
    where
        M: RegistryOps,
    {
        self.metrics = Some(Box::new(move |name: &'static str| Metrics::new(name, &registry)));
        self
    }

    /// Build the entity cache with the given configuration.
    pub fn build(self) -> Result<Cache<K, R>> {
        if self.prune_min == 0 {
            return Err(Error::ConfigError("prune min must be positive".to_string()));
        }
        if self.rules.ordering_field.is_empty() {
            return Err(Error::ConfigError("ordering field must not be empty".to_string()));
        }
        self.rules.merge_policy.validate()?;

        let metrics = match self.metrics {
            Some(builder) => builder(self.name),
            None => Metrics::noop(),
        };

        tracing::info!(
            "[entity cache]: build cache {}, ordering field: {}, prune min: {}, entry ttl: {:?}",
            self.name,
            self.rules.ordering_field,
            self.prune_min,
            self.entry_ttl
        );

        let inner = CacheInner {
            name: self.name,
            current: ArcSwap::from_pointee(Snapshot::new(self.entry_ttl)),
            writer: Mutex::new(()),
            rules: self.rules,
            prune_min: self.prune_min,
            event_listener: self.event_listener,
            metrics,
        };
        Ok(Cache { inner: Arc::new(inner) })
    }
}

struct CacheInner<K, R>
where
    K: Key,
    R: Reference,
{
    name: &'static str,
    current: ArcSwap<Snapshot<K, R>>,
    /// Serializes writers into one ordered stream. Readers never take it.
    writer: Mutex<()>,
    rules: WriteRules,
    prune_min: usize,
    event_listener: Option<Arc<dyn EventListener<Key = K>>>,
    metrics: Metrics,
}

/// Normalized entity cache.
///
/// Every lifecycle operation derives a new immutable [`Snapshot`] from the current one and publishes it atomically.
/// Readers load the current snapshot without locking and never observe a partially applied operation.
///
/// `Cache` is a shared handle. Clones refer to the same cache.
pub struct Cache<K, R>
where
    K: Key,
    R: Reference,
{
    inner: Arc<CacheInner<K, R>>,
}

impl<K, R> Clone for Cache<K, R>
where
    K: Key,
    R: Reference,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, R> Debug for Cache<K, R>
where
    K: Key,
    R: Reference,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("prune_min", &self.inner.prune_min)
            .finish()
    }
}

impl<K, R> Cache<K, R>
where
    K: Key,
    R: Reference,
{
    /// Name of the cache.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Load the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<K, R>> {
        self.inner.current.load_full()
    }

    /// Get the entry of `id` from the current snapshot.
    pub fn get<Q>(&self, id: &Q) -> Option<Arc<Entry>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.current.load().store().get(id).cloned()
    }

    /// Get the fetch status of `id` from the current snapshot.
    pub fn get_status<Q>(&self, id: &Q) -> Status
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.current.load().get_status(id)
    }

    /// Write entries and subscribe their references.
    ///
    /// An item is dropped if the stored entry carries a greater ordering token. Its reference is subscribed anyway,
    /// and the id leaves the prune set anyway.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::add"))]
    pub fn add(&self, batch: impl IntoIterator<Item = AddEntry<K, R>>) -> AddOutcome<K> {
        let batch = batch.into_iter().collect_vec();
        let now = Instant::now();
        self.inner.metrics.op_add.increase(1);

        let outcome = self.write(|snapshot, rules| snapshot.add(batch, rules, now));

        if !outcome.stale.is_empty() {
            self.inner.metrics.event_stale_write.increase(outcome.stale.len() as u64);
            if let Some(listener) = self.inner.event_listener.as_ref() {
                for stale in outcome.stale.iter() {
                    listener.on_stale_write(&stale.id, stale.current, stale.incoming);
                }
            }
        }
        outcome
    }

    /// Merge partial metadata into entries without checking ordering tokens, and extend dependency edges.
    ///
    /// Updating an absent id creates it with the given fields only.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::update"))]
    pub fn update(
        &self,
        batch: impl IntoIterator<Item = UpdateEntry<K>>,
        dependencies: impl IntoIterator<Item = DependencyUpdate<K, R>>,
    ) {
        let batch = batch.into_iter().collect_vec();
        let dependencies = dependencies.into_iter().collect_vec();
        let now = Instant::now();
        self.inner.metrics.op_update.increase(1);

        self.write(|snapshot, rules| snapshot.update(batch, dependencies, rules, now));
    }

    /// Merge partial metadata into entries, summing numeric leaves.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::increment"))]
    pub fn increment(&self, batch: impl IntoIterator<Item = UpdateEntry<K>>) {
        let batch = batch.into_iter().collect_vec();
        let now = Instant::now();
        self.inner.metrics.op_increment.increase(1);

        self.write(|snapshot, rules| snapshot.increment(batch, rules, now));
    }

    /// Overwrite fetch statuses.
    pub fn set_status(&self, batch: impl IntoIterator<Item = (K, Status)>) {
        let batch = batch.into_iter().collect_vec();
        self.inner.metrics.op_set_status.increase(1);

        self.write(|snapshot, _| snapshot.set_status(batch));
    }

    /// Subscribe references without touching entries. Subscribed ids leave the prune set.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::subscribe"))]
    pub fn subscribe(&self, batch: impl IntoIterator<Item = Subscription<K, R>>) {
        let batch = batch.into_iter().collect_vec();
        self.inner.metrics.op_subscribe.increase(1);

        self.write(|snapshot, _| snapshot.subscribe(batch));
    }

    /// Unsubscribe references. Unknown references are ignored.
    ///
    /// Returns the ids left without subscribers.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::unsubscribe"))]
    pub fn unsubscribe(&self, batch: impl IntoIterator<Item = Unsubscription<K, R>>) -> UnsubscribeOutcome<K> {
        let batch = batch.into_iter().collect_vec();
        self.inner.metrics.op_unsubscribe.increase(1);

        self.write(|snapshot, _| snapshot.unsubscribe(batch))
    }

    /// Replace dependency edges.
    pub fn replace_dependencies(&self, batch: impl IntoIterator<Item = DependencyUpdate<K, R>>) {
        let batch = batch.into_iter().collect_vec();
        self.inner.metrics.op_replace_dependencies.increase(1);

        self.write(|snapshot, _| snapshot.replace_dependencies(batch));
    }

    /// Mark ids for removal. Nothing is deleted until the removal is committed.
    pub fn mark_for_removal(&self, ids: impl IntoIterator<Item = K>) {
        let ids = ids.into_iter().collect_vec();
        self.inner.metrics.op_mark_for_removal.increase(1);

        self.write(|snapshot, _| snapshot.mark_for_removal(ids));
    }

    /// Delete the marked ids among `ids`.
    ///
    /// Ids that are not marked are kept. They are reported as anomalies, as are ids that have nothing to delete.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::commit_removal"))]
    pub fn commit_removal(&self, ids: impl IntoIterator<Item = K>) -> RemovalOutcome<K> {
        let ids = ids.into_iter().collect_vec();
        self.inner.metrics.op_commit_removal.increase(1);

        let outcome = self.write(|snapshot, _| snapshot.commit_removal(ids));
        self.report_removal(&outcome);
        outcome
    }

    /// Mark ids for removal, then commit the whole prune set once it holds at least `prune_min` ids.
    ///
    /// Marked ids that still have subscribers when the prune set is committed are kept and leave the prune set.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::memory::cache::remove"))]
    pub fn remove(&self, ids: impl IntoIterator<Item = K>) -> RemovalOutcome<K> {
        let ids = ids.into_iter().collect_vec();
        let prune_min = self.inner.prune_min;
        self.inner.metrics.op_mark_for_removal.increase(1);

        let outcome = self.write(|snapshot, _| {
            snapshot.mark_for_removal(ids);
            if snapshot.pending_prune_len() < prune_min {
                return RemovalOutcome::default();
            }
            snapshot.sweep()
        });

        if !outcome.is_empty() {
            self.inner.metrics.op_commit_removal.increase(1);
            self.report_removal(&outcome);
        }
        outcome
    }

    /// Mark entries expired without deleting their metadata. Absent ids are ignored.
    ///
    /// Returns the count of entries marked expired.
    pub fn set_expired(&self, ids: impl IntoIterator<Item = K>) -> usize {
        let ids = ids.into_iter().collect_vec();
        self.inner.metrics.op_set_expired.increase(1);

        self.write(|snapshot, _| snapshot.set_expired(ids))
    }

    /// Derive the next snapshot from the current one and publish it.
    fn write<T>(&self, f: impl FnOnce(&mut Snapshot<K, R>, &WriteRules) -> T) -> T {
        let _guard = self.inner.writer.lock();

        let mut next = Snapshot::clone(&self.inner.current.load());
        let res = f(&mut next, &self.inner.rules);
        strict_assert!(next.is_consistent());

        self.inner.metrics.entries.absolute(next.len() as u64);
        self.inner
            .metrics
            .references
            .absolute(next.registry().reference_count() as u64);
        self.inner.metrics.prune_pending.absolute(next.pending_prune_len() as u64);

        self.inner.current.store(Arc::new(next));
        res
    }

    fn report_removal(&self, outcome: &RemovalOutcome<K>) {
        self.inner.metrics.event_remove.increase(outcome.removed.len() as u64);
        self.inner.metrics.event_anomaly.increase(outcome.anomalies.len() as u64);

        for (id, anomaly) in outcome.anomalies.iter() {
            match anomaly {
                Anomaly::NotMarked => tracing::warn!(
                    "[entity cache]: {} {:?} in cache {}, the id is kept",
                    anomaly,
                    id,
                    self.inner.name
                ),
                Anomaly::AlreadyAbsent => {
                    tracing::warn!("[entity cache]: {} {:?} in cache {}", anomaly, id, self.inner.name)
                }
            }
        }

        if let Some(listener) = self.inner.event_listener.as_ref() {
            for id in outcome.removed.iter() {
                listener.on_leave(id);
            }
            for (id, anomaly) in outcome.anomalies.iter() {
                listener.on_anomaly(*anomaly, id);
            }
        }

        tracing::trace!(
            "[entity cache]: {} event: {}, count: {}",
            self.inner.name,
            Event::Remove.as_str(),
            outcome.removed.len()
        );
    }
}
