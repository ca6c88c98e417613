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

use super::{BoxedCounter, BoxedGauge, CounterVecOps, GaugeVecOps, RegistryOps};
use crate::event::Event;

trait Boxer {
    fn boxed(self) -> Box<Self>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}
impl<T> Boxer for T {}

/// Metrics of an entity cache.
#[derive(Debug)]
pub struct Metrics {
    /* lifecycle operations */
    /// Count of `add` operations.
    pub op_add: BoxedCounter,
    /// Count of `update` operations.
    pub op_update: BoxedCounter,
    /// Count of `increment` operations.
    pub op_increment: BoxedCounter,
    /// Count of `set_status` operations.
    pub op_set_status: BoxedCounter,
    /// Count of `subscribe` operations.
    pub op_subscribe: BoxedCounter,
    /// Count of `unsubscribe` operations.
    pub op_unsubscribe: BoxedCounter,
    /// Count of `replace_dependencies` operations.
    pub op_replace_dependencies: BoxedCounter,
    /// Count of `mark_for_removal` operations.
    pub op_mark_for_removal: BoxedCounter,
    /// Count of `commit_removal` operations.
    pub op_commit_removal: BoxedCounter,
    /// Count of `set_expired` operations.
    pub op_set_expired: BoxedCounter,

    /* events */
    /// Count of dropped stale writes.
    pub event_stale_write: BoxedCounter,
    /// Count of entities deleted by committed removals.
    pub event_remove: BoxedCounter,
    /// Count of anomalies observed by committed removals.
    pub event_anomaly: BoxedCounter,

    /* usage */
    /// Count of stored entries.
    pub entries: BoxedGauge,
    /// Count of live references.
    pub references: BoxedGauge,
    /// Count of ids marked for removal but not yet removed.
    pub prune_pending: BoxedGauge,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new<R>(name: &'static str, registry: &R) -> Self
    where
        R: RegistryOps,
    {
        let canon_cache_op_total =
            registry.register_counter_vec("canon_cache_op_total", "canon entity cache operations", &["name", "op"]);
        let canon_cache_event_total =
            registry.register_counter_vec("canon_cache_event_total", "canon entity cache events", &["name", "event"]);
        let canon_cache_entries =
            registry.register_gauge_vec("canon_cache_entries", "canon entity cache stored entries", &["name"]);
        let canon_cache_references =
            registry.register_gauge_vec("canon_cache_references", "canon entity cache live references", &["name"]);
        let canon_cache_prune_pending = registry.register_gauge_vec(
            "canon_cache_prune_pending",
            "canon entity cache ids pending removal",
            &["name"],
        );

        let op_add = canon_cache_op_total.counter(&[name, "add"]).boxed();
        let op_update = canon_cache_op_total.counter(&[name, "update"]).boxed();
        let op_increment = canon_cache_op_total.counter(&[name, "increment"]).boxed();
        let op_set_status = canon_cache_op_total.counter(&[name, "set_status"]).boxed();
        let op_subscribe = canon_cache_op_total.counter(&[name, "subscribe"]).boxed();
        let op_unsubscribe = canon_cache_op_total.counter(&[name, "unsubscribe"]).boxed();
        let op_replace_dependencies = canon_cache_op_total.counter(&[name, "replace_dependencies"]).boxed();
        let op_mark_for_removal = canon_cache_op_total.counter(&[name, "mark_for_removal"]).boxed();
        let op_commit_removal = canon_cache_op_total.counter(&[name, "commit_removal"]).boxed();
        let op_set_expired = canon_cache_op_total.counter(&[name, "set_expired"]).boxed();

        let event_stale_write = canon_cache_event_total
            .counter(&[name, Event::StaleWrite.as_str()])
            .boxed();
        let event_remove = canon_cache_event_total.counter(&[name, Event::Remove.as_str()]).boxed();
        let event_anomaly = canon_cache_event_total.counter(&[name, Event::Anomaly.as_str()]).boxed();

        let entries = canon_cache_entries.gauge(&[name]).boxed();
        let references = canon_cache_references.gauge(&[name]).boxed();
        let prune_pending = canon_cache_prune_pending.gauge(&[name]).boxed();

        Self {
            op_add,
            op_update,
            op_increment,
            op_set_status,
            op_subscribe,
            op_unsubscribe,
            op_replace_dependencies,
            op_mark_for_removal,
            op_commit_removal,
            op_set_expired,
            event_stale_write,
            event_remove,
            event_anomaly,
            entries,
            references,
            prune_pending,
        }
    }

    /// Build noop metrics.
    pub fn noop() -> Self {
        use super::registry::noop::NoopMetricsRegistry;

        Self::new("canon", &NoopMetricsRegistry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::noop::NoopMetricsRegistry;

    fn case(registry: &impl RegistryOps) {
        let _ = Metrics::new("test", registry);
    }

    #[test]
    fn test_metrics_noop() {
        case(&NoopMetricsRegistry);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_metrics_prometheus() {
        use crate::metrics::registry::prometheus::PrometheusMetricsRegistry;

        case(&PrometheusMetricsRegistry::new(prometheus::Registry::new()));
    }
}
