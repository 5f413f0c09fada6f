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

//! Metric identifiers, values and errors.

pub mod registry;

use serde::Serialize;
use std::fmt::{self, Display};
use std::time::Instant;
use thiserror::Error;

/// A structured identifier for a metric: a namespace, a name and sorted labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetricId {
    /// The broad category of the metric (e.g., "bundles", "assets").
    pub namespace: String,
    /// The specific name of the metric (e.g., "finalized").
    pub name: String,
    /// Key-value pairs for dimensional filtering, sorted by key.
    pub labels: Vec<(String, String)>,
}

impl MetricId {
    /// Creates an unlabelled id.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a label. Labels are kept sorted by key.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self.labels.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)?;
        if !self.labels.is_empty() {
            let labels = self
                .labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "[{labels}]")?;
        }
        Ok(())
    }
}

/// The fundamental type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricType {
    /// Only ever increases.
    Counter,
    /// Goes up and down.
    Gauge,
    /// A distribution of samples across buckets.
    Histogram,
}

/// The current value of a metric.
#[derive(Debug, Clone, Serialize)]
pub enum MetricValue {
    /// A counter.
    Counter(u64),
    /// A gauge.
    Gauge(f64),
    /// Sample count and sum plus cumulative bucket counts.
    Histogram {
        /// Number of recorded samples.
        count: u64,
        /// Sum of every recorded sample.
        sum: f64,
        /// Upper bounds of the buckets.
        bucket_bounds: Vec<f64>,
        /// Samples at or below each bound.
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// The [`MetricType`] of this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// The value of a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// The sample count of a histogram.
    pub fn histogram_count(&self) -> Option<u64> {
        match self {
            MetricValue::Histogram { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// The sample sum of a histogram.
    pub fn histogram_sum(&self) -> Option<f64> {
        match self {
            MetricValue::Histogram { sum, .. } => Some(*sum),
            _ => None,
        }
    }
}

/// A metric with its descriptive metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric's id.
    pub id: MetricId,
    /// What the metric measures.
    pub description: String,
    /// Unit of measurement (e.g., "ms").
    pub unit: String,
    /// When the metric was last written.
    pub last_updated: Instant,
    /// The current value.
    pub value: MetricValue,
}

impl Metric {
    fn new(id: MetricId, description: String, unit: String, value: MetricValue) -> Self {
        Self {
            id,
            description,
            unit,
            last_updated: Instant::now(),
            value,
        }
    }

    /// A counter starting at zero.
    pub fn new_counter(id: MetricId, description: impl Into<String>) -> Self {
        Self::new(
            id,
            description.into(),
            "count".into(),
            MetricValue::Counter(0),
        )
    }

    /// A gauge starting at zero.
    pub fn new_gauge(id: MetricId, description: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::new(id, description.into(), unit.into(), MetricValue::Gauge(0.0))
    }

    /// An empty histogram with the given bucket bounds.
    pub fn new_histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> Self {
        let bucket_counts = vec![0; bucket_bounds.len()];
        Self::new(
            id,
            description.into(),
            unit.into(),
            MetricValue::Histogram {
                count: 0,
                sum: 0.0,
                bucket_bounds,
                bucket_counts,
            },
        )
    }
}

/// A specialized `Result` type for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error raised by the metrics registry.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    /// The metric was never registered.
    #[error("Metric not found: {0}")]
    MetricNotFound(MetricId),
    /// The operation does not apply to this kind of metric.
    #[error("Type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// The type the operation needs.
        expected: MetricType,
        /// The type actually stored.
        found: MetricType,
    },
    /// A snapshot could not be serialized.
    #[error("Export failed: {0}")]
    Export(String),
}
