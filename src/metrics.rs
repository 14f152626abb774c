//! Observability: histogram metrics for the activation path.
//! Histograms track p50/p95/p99 for impulse classification time, event queue
//! wait, and arm-to-confirm latency. Recording is cheap enough for the audio
//! processing loop.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Fixed-capacity ring of samples backing one histogram.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Stores histograms for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            ring_capacity: 1024,
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    /// Get percentile for a metric (p value 0-100). Returns microseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    /// Summary of all metrics at p50/p95/p99, logged on demand.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        let mut out = HashMap::new();
        for (&name, ring) in hists.iter() {
            out.insert(
                name.to_string(),
                MetricSummary {
                    p50_us: ring.percentile(50.0),
                    p95_us: ring.percentile(95.0),
                    p99_us: ring.percentile(99.0),
                    count: ring.count,
                },
            );
        }
        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const IMPULSE_CLASSIFY: &str = "t_impulse_classify";
    pub const DOUBLE_IMPULSE: &str = "t_double_impulse";
    pub const EVENT_QUEUE_WAIT: &str = "queue_wait_events";
    pub const ARM_TO_CONFIRM: &str = "t_arm_to_confirm";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metric_reads_zero() {
        let m = MetricsRegistry::new();
        assert_eq!(m.percentile("nope", 50.0), 0.0);
    }

    #[test]
    fn percentiles_over_known_samples() {
        let m = MetricsRegistry::new();
        for v in 1..=100 {
            m.record(metric_names::IMPULSE_CLASSIFY, v as f64);
        }
        let p50 = m.percentile(metric_names::IMPULSE_CLASSIFY, 50.0);
        assert!((p50 - 50.0).abs() <= 1.0, "p50 was {p50}");
        let p99 = m.percentile(metric_names::IMPULSE_CLASSIFY, 99.0);
        assert!(p99 >= 99.0, "p99 was {p99}");
    }

    #[test]
    fn ring_overwrites_oldest() {
        let m = MetricsRegistry::new();
        // Fill past capacity with a low value, then overwrite with a high one.
        for _ in 0..1024 {
            m.record(metric_names::EVENT_QUEUE_WAIT, 1.0);
        }
        for _ in 0..1024 {
            m.record(metric_names::EVENT_QUEUE_WAIT, 9.0);
        }
        assert_eq!(m.percentile(metric_names::EVENT_QUEUE_WAIT, 50.0), 9.0);
    }

    #[test]
    fn summary_includes_recorded_metrics() {
        let m = MetricsRegistry::new();
        m.record(metric_names::ARM_TO_CONFIRM, 1500.0);
        let summary = m.summary();
        let s = summary.get(metric_names::ARM_TO_CONFIRM).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.p50_us, 1500.0);
    }
}
