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

#[cfg(feature = "prometheus")]
pub use crate::common::metrics::registry::prometheus::PrometheusMetricsRegistry;
pub use crate::{
    caches::{EntityCaches, EntityCachesBuilder, EntityId, Release},
    common::{
        code::{Key, Reference},
        event::{Anomaly, Event, EventListener},
        kind::Kind,
        metrics::{registry::noop::NoopMetricsRegistry, RegistryOps},
    },
    memory::{
        merge, AddEntry, AddOutcome, Cache, CacheBuilder, Dependency, DependencyUpdate, Entry, EntryStore, Error,
        FieldPolicy, MembershipLayout, MergeMode, MergePolicy, Metadata, RemovalOutcome, Result, Snapshot, StaleWrite,
        Status, Subscription, SubscriptionRegistry, Timestamp, UnsubscribeOutcome, Unsubscribed, Unsubscription,
        UpdateEntry, DEFAULT_ENTRY_TTL, DEFAULT_ORDERING_FIELD, DEFAULT_PRUNE_MIN,
    },
};
