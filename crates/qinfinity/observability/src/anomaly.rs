//! Per-metric anomaly detection. A baseline (mean, stddev) is established
//! after enough samples; later values are z-scored against it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub z_score: f64,
    pub baseline_mean: f64,
    pub baseline_stddev: f64,
    pub critical: bool,
}

/// Welford running statistics for one metric series.
#[derive(Debug, Default, Clone)]
struct SeriesStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl SeriesStats {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

pub struct AnomalyDetector {
    series: DashMap<String, SeriesStats>,
    min_samples: usize,
    z_threshold: f64,
    critical_z: f64,
    critical_count: AtomicU32,
}

impl AnomalyDetector {
    pub fn new(min_samples: usize, z_threshold: f64, critical_z: f64) -> Self {
        Self {
            series: DashMap::new(),
            min_samples: min_samples.max(2),
            z_threshold,
            critical_z,
            critical_count: AtomicU32::new(0),
        }
    }

    /// Feed one value; returns an anomaly when the baseline exists and the
    /// value deviates beyond the threshold. The observed value always joins
    /// the baseline afterwards.
    pub fn observe(&self, metric: &str, value: f64) -> Option<Anomaly> {
        let mut stats = self.series.entry(metric.to_string()).or_default();

        let anomaly = if stats.count as usize >= self.min_samples {
            let stddev = stats.stddev();
            if stddev > 0.0 {
                let z = (value - stats.mean) / stddev;
                if z.abs() > self.z_threshold {
                    let critical = z.abs() > self.critical_z;
                    if critical {
                        self.critical_count.fetch_add(1, Ordering::SeqCst);
                        warn!(metric, value, z_score = z, "critical metric anomaly");
                    }
                    Some(Anomaly {
                        metric: metric.to_string(),
                        value,
                        z_score: z,
                        baseline_mean: stats.mean,
                        baseline_stddev: stddev,
                        critical,
                    })
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        };

        stats.observe(value);
        anomaly
    }

    /// Critical anomalies seen since construction.
    pub fn critical_count(&self) -> u32 {
        self.critical_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(10, 2.0, 3.0)
    }

    #[test]
    fn no_anomaly_before_baseline() {
        let detector = detector();
        for _ in 0..9 {
            assert!(detector.observe("latency", 100.0).is_none());
        }
        // 10th sample: baseline present but stddev is 0 for constant series
        assert!(detector.observe("latency", 100.0).is_none());
    }

    #[test]
    fn deviation_beyond_threshold_is_flagged() {
        let detector = detector();
        // Alternate around 100 so stddev is non-zero.
        for i in 0..20 {
            let value = if i % 2 == 0 { 99.0 } else { 101.0 };
            detector.observe("latency", value);
        }

        let anomaly = detector.observe("latency", 110.0).expect("flagged");
        assert!(anomaly.z_score > 2.0);
        assert!(anomaly.critical);
        assert_eq!(detector.critical_count(), 1);
    }

    #[test]
    fn moderate_deviation_is_not_critical() {
        let detector = AnomalyDetector::new(10, 2.0, 3.0);
        for i in 0..50 {
            let value = 100.0 + (i % 5) as f64; // mean 102, stddev ~1.43
            detector.observe("latency", value);
        }

        let anomaly = detector.observe("latency", 105.5).expect("flagged");
        assert!(!anomaly.critical);
        assert_eq!(detector.critical_count(), 0);
    }

    #[test]
    fn series_are_independent()  {
        let detector = detector();
        for i in 0..20 {
            detector.observe("a", if i % 2 == 0 { 1.0 } else { 2.0 });
        }
        // "b" has no baseline, so nothing is flagged regardless of value.
        assert!(detector.observe("b", 1_000.0).is_none());
    }
}
