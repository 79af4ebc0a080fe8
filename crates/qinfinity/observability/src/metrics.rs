//! Metric sample store with label sets and age-based retention.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    /// Sorted key/value pairs; sorted so equal label sets compare equal.
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub timestamp_ms: u64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, timestamp_ms: u64) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            value,
            timestamp_ms,
        }
    }

    pub fn with_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.labels.sort();
        self
    }
}

/// Append-only in-window sample store; eviction removes by age only.
pub struct MetricStore {
    samples: RwLock<Vec<MetricSample>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
        }
    }

    pub fn record(&self, sample: MetricSample) {
        if let Ok(mut samples) = self.samples.write() {
            samples.push(sample);
        }
    }

    pub fn query(&self, name: &str) -> Vec<MetricSample> {
        self.samples
            .read()
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.name == name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.samples.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop samples older than the cutoff; returns how many were evicted.
    pub fn evict_older_than(&self, cutoff_ms: u64) -> usize {
        let Ok(mut samples) = self.samples.write() else {
            return 0;
        };
        let before = samples.len();
        samples.retain(|s| s.timestamp_ms >= cutoff_ms);
        before - samples.len()
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}
