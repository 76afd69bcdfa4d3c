//! Decision metrics with Prometheus text export

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Engine decision metrics
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Decisions reached (allow or deny)
    pub total_decisions: u64,

    /// Number of allowed decisions
    pub allowed_decisions: u64,

    /// Number of denied decisions
    pub denied_decisions: u64,

    /// Requests rejected before resolution started
    pub invalid_requests: u64,

    /// Resolutions aborted by storage failures or timeouts
    pub resolution_errors: u64,

    /// Decisions per reason code
    pub reasons: BTreeMap<String, u64>,

    /// Latency percentiles
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,

    /// Average latency
    pub avg_latency_ms: f64,

    /// Samples the percentiles were computed from
    pub latency_samples: usize,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Default number of latency samples kept for percentiles
pub const DEFAULT_LATENCY_WINDOW: usize = 10_000;

/// Metrics collector
///
/// Recording is lock-free for counters and O(1) for latency samples;
/// percentiles are computed only when a snapshot is taken.
pub struct MetricsCollector {
    total_decisions: AtomicU64,
    allowed_decisions: AtomicU64,
    denied_decisions: AtomicU64,
    invalid_requests: AtomicU64,
    resolution_errors: AtomicU64,

    /// Per-reason counters
    reasons: DashMap<String, u64>,

    /// Most recent latency samples in milliseconds, oldest first
    latency_samples: Mutex<VecDeque<f64>>,

    window: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }

    /// Create a collector keeping at most `window` latency samples
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            total_decisions: AtomicU64::new(0),
            allowed_decisions: AtomicU64::new(0),
            denied_decisions: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            resolution_errors: AtomicU64::new(0),
            reasons: DashMap::new(),
            latency_samples: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    /// Record a decision and its reason code
    pub fn record_decision(&self, allowed: bool, reason: &str) {
        *self.reasons.entry(reason.to_string()).or_insert(0) += 1;

        self.total_decisions.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.allowed_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied_decisions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request rejected during validation
    pub fn record_invalid_request(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aborted resolution
    pub fn record_resolution_error(&self, code: &str) {
        *self.reasons.entry(code.to_string()).or_insert(0) += 1;
        self.resolution_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decision latency, evicting the oldest sample when the window is full
    pub fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(latency_ms);
    }

    /// Get current metrics snapshot
    pub fn get_metrics(&self) -> EngineMetrics {
        let mut sorted: Vec<f64> = self.latency_samples.lock().iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let avg_latency_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        EngineMetrics {
            total_decisions: self.total_decisions.load(Ordering::Relaxed),
            allowed_decisions: self.allowed_decisions.load(Ordering::Relaxed),
            denied_decisions: self.denied_decisions.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            resolution_errors: self.resolution_errors.load(Ordering::Relaxed),
            reasons: self
                .reasons
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            latency_p50_ms: Self::percentile(&sorted, 0.50),
            latency_p90_ms: Self::percentile(&sorted, 0.90),
            latency_p99_ms: Self::percentile(&sorted, 0.99),
            avg_latency_ms,
            latency_samples: sorted.len(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.total_decisions,
            &self.allowed_decisions,
            &self.denied_decisions,
            &self.invalid_requests,
            &self.resolution_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.reasons.clear();
        self.latency_samples.lock().clear();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics();

        let mut out = format!(
            r#"# HELP warden_decisions_total Decisions reached
# TYPE warden_decisions_total counter
warden_decisions_total {}

# HELP warden_allowed_total Allowed decisions
# TYPE warden_allowed_total counter
warden_allowed_total {}

# HELP warden_denied_total Denied decisions
# TYPE warden_denied_total counter
warden_denied_total {}

# HELP warden_invalid_requests_total Requests rejected during validation
# TYPE warden_invalid_requests_total counter
warden_invalid_requests_total {}

# HELP warden_resolution_errors_total Resolutions aborted by storage failure or timeout
# TYPE warden_resolution_errors_total counter
warden_resolution_errors_total {}

# HELP warden_decision_latency_seconds Decision latency percentiles
# TYPE warden_decision_latency_seconds summary
warden_decision_latency_seconds{{quantile="0.5"}} {}
warden_decision_latency_seconds{{quantile="0.9"}} {}
warden_decision_latency_seconds{{quantile="0.99"}} {}

# HELP warden_decision_reasons_total Decisions per reason code
# TYPE warden_decision_reasons_total counter
"#,
            metrics.total_decisions,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.invalid_requests,
            metrics.resolution_errors,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        );

        for (reason, count) in &metrics.reasons {
            out.push_str(&format!(
                "warden_decision_reasons_total{{reason=\"{}\"}} {}\n",
                reason, count
            ));
        }

        out
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
