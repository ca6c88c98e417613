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
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use parking_lot::Mutex;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Registry,
};

use crate::metrics::{CounterOps, CounterVecOps, GaugeOps, GaugeVecOps, RegistryOps};

/// Metric vectors registered per registry, so that multiple caches sharing one registry do not register twice.
static METRICS: LazyLock<Mutex<HashMap<PrometheusMetricsRegistry, HashMap<Metadata, MetricVec>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Metadata {
    name: &'static str,
    desc: &'static str,
    label_names: &'static [&'static str],
}

fn get_or_register(
    registry: &PrometheusMetricsRegistry,
    metadata: Metadata,
    register: impl FnOnce(&Metadata, &Registry) -> MetricVec,
) -> MetricVec {
    let mut metrics = METRICS.lock();
    metrics
        .entry(registry.clone())
        .or_default()
        .entry(metadata.clone())
        .or_insert_with(|| register(&metadata, registry.registry.as_ref()))
        .clone()
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[&'static str]) -> impl CounterOps {
        self.with_label_values(labels)
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[&'static str]) -> impl GaugeOps {
        self.with_label_values(labels)
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and used by multiple caches, without worrying about
/// duplicately registering.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Arc<Registry>,
}

impl PartialEq for PrometheusMetricsRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for PrometheusMetricsRegistry {}

impl Hash for PrometheusMetricsRegistry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.registry).hash(state);
    }
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> impl CounterVecOps {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        let vec = get_or_register(self, metadata, |m, registry| {
            MetricVec::Counter(
                register_int_counter_vec_with_registry!(m.name, m.desc, m.label_names, registry)
                    .expect("static metric descriptors must be valid"),
            )
        });
        match vec {
            MetricVec::Counter(v) => v,
            MetricVec::Gauge(_) => unreachable!("metric {name} is registered as a gauge"),
        }
    }

    fn register_gauge_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> impl GaugeVecOps {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        let vec = get_or_register(self, metadata, |m, registry| {
            MetricVec::Gauge(
                register_int_gauge_vec_with_registry!(m.name, m.desc, m.label_names, registry)
                    .expect("static metric descriptors must be valid"),
            )
        });
        match vec {
            MetricVec::Gauge(v) => v,
            MetricVec::Counter(_) => unreachable!("metric {name} is registered as a counter"),
        }
    }
}
