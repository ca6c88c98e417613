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

use std::{collections::VecDeque, sync::Arc, time::Duration};

use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    presets, Cache, CacheBuilder, DependencyUpdate, Entry, EventListener, Kind, Reference, RegistryOps, Result,
    Unsubscription, DEFAULT_ENTRY_TTL, DEFAULT_ORDERING_FIELD, DEFAULT_PRUNE_MIN,
};

/// Id of the entities of every kind.
pub type EntityId = u64;

type CacheConfigurer<R> = Box<dyn Fn(CacheBuilder<EntityId, R>) -> CacheBuilder<EntityId, R>>;

/// Builder of [`EntityCaches`].
pub struct EntityCachesBuilder<R>
where
    R: Reference,
{
    ordering_field: String,
    prune_min: usize,
    entry_ttl: Duration,
    event_listener: Option<Arc<dyn EventListener<Key = EntityId>>>,
    metrics: Option<CacheConfigurer<R>>,
}

impl<R> Default for EntityCachesBuilder<R>
where
    R: Reference,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> EntityCachesBuilder<R>
where
    R: Reference,
{
    /// Create a builder with the default configuration and the merge policy preset of every kind.
    pub fn new() -> Self {
        Self {
            ordering_field: DEFAULT_ORDERING_FIELD.to_string(),
            prune_min: DEFAULT_PRUNE_MIN,
            entry_ttl: DEFAULT_ENTRY_TTL,
            event_listener: None,
            metrics: None,
        }
    }

    /// Set the metadata field ordering tokens are read from.
    pub fn with_ordering_field(mut self, ordering_field: impl Into<String>) -> Self {
        self.ordering_field = ordering_field.into();
        self
    }

    /// Set the count of pending ids that commits a batched removal, for every kind.
    pub fn with_prune_min(mut self, prune_min: usize) -> Self {
        self.prune_min = prune_min;
        self
    }

    /// Set the age after which an entry is considered stale, for every kind.
    pub fn with_entry_ttl(mut self, entry_ttl: Duration) -> Self {
        self.entry_ttl = entry_ttl;
        self
    }

    /// Set the event listener shared by every kind.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = EntityId>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the metrics registry shared by every kind. Caches are labeled with the kind name.
    pub fn with_metrics_registry<M>(mut self, registry: M) -> Self
    where
        M: RegistryOps + Clone,
    {
        self.metrics = Some(Box::new(move |builder: CacheBuilder<EntityId, R>| {
            builder.with_metrics_registry(registry.clone())
        }));
        self
    }

    /// Build the caches of every kind.
    pub fn build(self) -> Result<EntityCaches<R>> {
        let build = |kind: Kind| -> Result<Cache<EntityId, R>> {
            let mut builder = CacheBuilder::new()
                .with_name(kind.as_str())
                .with_merge_policy(presets::policy(kind))
                .with_ordering_field(self.ordering_field.clone())
                .with_prune_min(self.prune_min)
                .with_entry_ttl(self.entry_ttl);
            if let Some(listener) = self.event_listener.as_ref() {
                builder = builder.with_event_listener(listener.clone());
            }
            if let Some(metrics) = self.metrics.as_ref() {
                builder = metrics(builder);
            }
            builder.build()
        };

        Ok(EntityCaches {
            tracks: build(Kind::Track)?,
            users: build(Kind::User)?,
            collections: build(Kind::Collection)?,
        })
    }
}

/// Outcome of a cascading release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    /// Entities left without subscribers, in release order.
    pub orphaned: Vec<(Kind, EntityId)>,
    /// Entities deleted by the batched removals the release triggered.
    pub removed: Vec<(Kind, EntityId)>,
}

/// One cache per entity kind.
///
/// Entities of different kinds depend on each other through dependency edges, e.g. a collection holds a reference
/// on each of its tracks. [`EntityCaches::release`] follows these edges.
pub struct EntityCaches<R>
where
    R: Reference,
{
    tracks: Cache<EntityId, R>,
    users: Cache<EntityId, R>,
    collections: Cache<EntityId, R>,
}

impl<R> Clone for EntityCaches<R>
where
    R: Reference,
{
    fn clone(&self) -> Self {
        Self {
            tracks: self.tracks.clone(),
            users: self.users.clone(),
            collections: self.collections.clone(),
        }
    }
}

impl<R> EntityCaches<R>
where
    R: Reference,
{
    /// Create the caches of every kind with the default configuration.
    pub fn new() -> Result<Self> {
        EntityCachesBuilder::new().build()
    }

    /// Get the cache of `kind`.
    pub fn cache(&self, kind: Kind) -> &Cache<EntityId, R> {
        match kind {
            Kind::Track => &self.tracks,
            Kind::User => &self.users,
            Kind::Collection => &self.collections,
        }
    }

    /// Cache of tracks.
    pub fn tracks(&self) -> &Cache<EntityId, R> {
        &self.tracks
    }

    /// Cache of users.
    pub fn users(&self) -> &Cache<EntityId, R> {
        &self.users
    }

    /// Cache of collections.
    pub fn collections(&self) -> &Cache<EntityId, R> {
        &self.collections
    }

    /// Get the entry of `id` in the cache of `kind`.
    pub fn get(&self, kind: Kind, id: EntityId) -> Option<Arc<Entry>> {
        self.cache(kind).get(&id)
    }

    /// Unsubscribe references from the cache of `kind`, and release whatever is left without subscribers.
    ///
    /// An entity left without subscribers releases the references its dependency edges hold in the caches of the
    /// kinds they point at, which may leave more entities without subscribers. Every released entity loses its
    /// dependency edges and is handed to the batched removal of its cache.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "canon::caches::release"))]
    pub fn release(&self, kind: Kind, batch: impl IntoIterator<Item = Unsubscription<EntityId, R>>) -> Release {
        let mut release = Release::default();
        let mut queue = VecDeque::from([(kind, batch.into_iter().collect_vec())]);

        while let Some((kind, batch)) = queue.pop_front() {
            let cache = self.cache(kind);
            let orphaned = cache.unsubscribe(batch).orphaned;
            if orphaned.is_empty() {
                continue;
            }

            let snapshot = cache.snapshot();
            let mut cascade: HashMap<Kind, Vec<Unsubscription<EntityId, R>>> = HashMap::new();
            let mut released = vec![];
            for id in orphaned.iter() {
                let mut dependencies = snapshot.dependencies_of(id).peekable();
                if dependencies.peek().is_none() {
                    continue;
                }
                for dependency in dependencies {
                    cascade
                        .entry(dependency.kind)
                        .or_default()
                        .push(Unsubscription::new(dependency.reference.clone()));
                }
                released.push(DependencyUpdate {
                    id: *id,
                    dependencies: vec![],
                });
            }
            drop(snapshot);

            if !released.is_empty() {
                tracing::debug!(
                    "[entity caches]: {} released {} dependent entities, cascade: {:?}",
                    kind,
                    released.len(),
                    cascade.iter().map(|(kind, batch)| (*kind, batch.len())).collect_vec()
                );
                cache.replace_dependencies(released);
            }

            let removal = cache.remove(orphaned.iter().copied());
            release.orphaned.extend(orphaned.into_iter().map(|id| (kind, id)));
            release.removed.extend(removal.removed.into_iter().map(|id| (kind, id)));

            queue.extend(cascade);
        }

        release
    }
}
