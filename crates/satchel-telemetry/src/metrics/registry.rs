// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry for managing metrics.

use super::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

#[derive(Debug, Default)]
struct MetricStore {
    metrics: RwLock<HashMap<MetricId, Metric>>,
}

impl MetricStore {
    fn put(&self, metric: Metric) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metric.id.clone(), metric);
    }

    fn get(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    /// Applies `f` to the stored value under the write lock.
    fn update<T>(
        &self,
        id: &MetricId,
        f: impl FnOnce(&mut MetricValue) -> MetricsResult<T>,
    ) -> MetricsResult<T> {
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let metric = metrics
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        let out = f(&mut metric.value)?;
        metric.last_updated = Instant::now();
        Ok(out)
    }
}

/// A serializable view of one metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    /// The formatted id (`namespace:name[labels]`).
    pub id: String,
    /// What the metric measures.
    pub description: String,
    /// Unit of measurement.
    pub unit: String,
    /// The value at snapshot time.
    pub value: MetricValue,
}

/// Central registry for the manager's metrics.
///
/// Handles returned by the `register_*` methods write straight into the
/// registry and are cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    store: Arc<MetricStore>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter starting at zero.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> CounterHandle {
        let id = MetricId::new(namespace, name);
        self.store.put(Metric::new_counter(id.clone(), description));
        CounterHandle {
            id,
            store: self.store.clone(),
        }
    }

    /// Registers a gauge starting at zero.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> GaugeHandle {
        let id = MetricId::new(namespace, name);
        self.store
            .put(Metric::new_gauge(id.clone(), description, unit));
        GaugeHandle {
            id,
            store: self.store.clone(),
        }
    }

    /// Registers an empty histogram.
    pub fn register_histogram(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        buckets: Vec<f64>,
    ) -> HistogramHandle {
        let id = MetricId::new(namespace, name);
        self.store.put(Metric::new_histogram(
            id.clone(),
            description,
            unit,
            buckets,
        ));
        HistogramHandle {
            id,
            store: self.store.clone(),
        }
    }

    /// A copy of the metric registered under `id`.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.store.get(id)
    }

    /// Number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.store
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every metric of a namespace, sorted by id.
    pub fn namespace_snapshot(&self, namespace: &str) -> Vec<MetricSnapshot> {
        self.snapshot(|id| id.namespace == namespace)
    }

    /// Every metric, sorted by id, as pretty-printed JSON.
    pub fn export_json(&self) -> MetricsResult<String> {
        serde_json::to_string_pretty(&self.snapshot(|_| true))
            .map_err(|e| MetricsError::Export(e.to_string()))
    }

    fn snapshot(&self, keep: impl Fn(&MetricId) -> bool) -> Vec<MetricSnapshot> {
        let mut out: Vec<_> = self
            .store
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| keep(&m.id))
            .map(|m| MetricSnapshot {
                id: m.id.to_string(),
                description: m.description.clone(),
                unit: m.unit.clone(),
                value: m.value.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

/// Handle to a registered counter.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl CounterHandle {
    /// Adds one, returning the new value.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.increment_by(1)
    }

    /// Adds `amount`, returning the new value.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        self.store.update(&self.id, |value| match value {
            MetricValue::Counter(v) => {
                *v = v.saturating_add(amount);
                Ok(*v)
            }
            other => Err(mismatch(MetricType::Counter, other)),
        })
    }

    /// The current value.
    pub fn get(&self) -> MetricsResult<u64> {
        let metric = self.store.get(&self.id)?;
        metric
            .value
            .as_counter()
            .ok_or_else(|| mismatch(MetricType::Counter, &metric.value))
    }

    /// The metric's id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered gauge.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl GaugeHandle {
    /// Sets the gauge.
    pub fn set(&self, value: f64) -> MetricsResult<()> {
        self.store.update(&self.id, |current| match current {
            MetricValue::Gauge(v) => {
                *v = value;
                Ok(())
            }
            other => Err(mismatch(MetricType::Gauge, other)),
        })
    }

    /// The current value.
    pub fn get(&self) -> MetricsResult<f64> {
        let metric = self.store.get(&self.id)?;
        metric
            .value
            .as_gauge()
            .ok_or_else(|| mismatch(MetricType::Gauge, &metric.value))
    }

    /// The metric's id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered histogram.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl HistogramHandle {
    /// Records one sample.
    pub fn observe(&self, sample: f64) -> MetricsResult<()> {
        self.store.update(&self.id, |value| match value {
            MetricValue::Histogram {
                count,
                sum,
                bucket_bounds,
                bucket_counts,
            } => {
                *count += 1;
                *sum += sample;
                for (bucket, bound) in bucket_counts.iter_mut().zip(bucket_bounds.iter()) {
                    if sample <= *bound {
                        *bucket += 1;
                    }
                }
                Ok(())
            }
            other => Err(mismatch(MetricType::Histogram, other)),
        })
    }

    /// Number of samples recorded so far.
    pub fn sample_count(&self) -> MetricsResult<u64> {
        let metric = self.store.get(&self.id)?;
        metric
            .value
            .histogram_count()
            .ok_or_else(|| mismatch(MetricType::Histogram, &metric.value))
    }

    /// The metric's id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

fn mismatch(expected: MetricType, found: &MetricValue) -> MetricsError {
    MetricsError::TypeMismatch {
        expected,
        found: found.metric_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_operations() {
        let registry = MetricsRegistry::new();
        let counter = registry.register_counter("bundles", "requested", "Bundles requested");

        assert_eq!(counter.increment().unwrap(), 1);
        assert_eq!(counter.increment_by(4).unwrap(), 5);
        assert_eq!(counter.get().unwrap(), 5);
        assert_eq!(registry.metric_count(), 1);
    }

    #[test]
    fn gauge_operations() {
        let registry = MetricsRegistry::new();
        let gauge = registry.register_gauge("bundles", "unload_queue_depth", "Queued", "bundles");
        gauge.set(3.0).unwrap();
        assert_eq!(gauge.get().unwrap(), 3.0);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let registry = MetricsRegistry::new();
        let histogram =
            registry.register_histogram("assets", "decode_time", "Decode", "ms", vec![1.0, 10.0]);
        histogram.observe(0.5).unwrap();
        histogram.observe(5.0).unwrap();
        histogram.observe(50.0).unwrap();
        assert_eq!(histogram.sample_count().unwrap(), 3);

        let metric = registry.get_metric(histogram.id()).unwrap();
        match metric.value {
            MetricValue::Histogram { bucket_counts, .. } => assert_eq!(bucket_counts, vec![1, 2]),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn histogram_keeps_a_fixed_footprint() {
        let registry = MetricsRegistry::new();
        let histogram =
            registry.register_histogram("bundles", "load_time", "Load", "ms", vec![1.0]);
        for _ in 0..100_000 {
            histogram.observe(2.0).unwrap();
        }
        assert_eq!(histogram.sample_count().unwrap(), 100_000);

        let metric = registry.get_metric(histogram.id()).unwrap();
        assert_eq!(metric.value.histogram_sum(), Some(200_000.0));
        match metric.value.clone() {
            MetricValue::Histogram { bucket_counts, .. } => assert_eq!(bucket_counts, vec![0]),
            other => panic!("unexpected value {other:?}"),
        }
        let json = serde_json::to_string(&metric.value).unwrap();
        assert!(json.len() < 256, "serialized histogram grew to {} bytes", json.len());
    }

    #[test]
    fn clones_share_the_store() {
        let registry = MetricsRegistry::new();
        let counter = registry.register_counter("bundles", "failed", "Failed");
        let view = registry.clone();
        counter.increment().unwrap();
        let metric = view.get_metric(counter.id()).unwrap();
        assert_eq!(metric.value.as_counter(), Some(1));
    }

    #[test]
    fn export_lists_every_metric() {
        let registry = MetricsRegistry::new();
        registry.register_counter("bundles", "finalized", "Finalized");
        registry.register_gauge("assets", "indexed", "Indexed", "assets");
        let json = registry.export_json().unwrap();
        let assets = json.find("assets:indexed").expect("gauge exported");
        let bundles = json.find("bundles:finalized").expect("counter exported");
        assert!(assets < bundles);
        assert_eq!(registry.namespace_snapshot("bundles").len(), 1);
    }

    #[test]
    fn unknown_metric_is_reported() {
        let registry = MetricsRegistry::new();
        let err = registry
            .get_metric(&MetricId::new("nope", "missing"))
            .unwrap_err();
        assert!(matches!(err, MetricsError::MetricNotFound(_)));
    }
}
