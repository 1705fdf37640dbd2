//! Engine metrics collection

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Engine counters and latency summary
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Authorization checks answered
    pub total_checks: u64,

    /// Checks that allowed
    pub allowed_checks: u64,

    /// Checks that denied
    pub denied_checks: u64,

    /// Full resolutions run against the store
    pub resolutions: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Resolution latency percentiles
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,

    /// Failed resolutions or checks
    pub error_count: u64,
}

impl EngineMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_checks + self.denied_checks;
        if total == 0 {
            0.0
        } else {
            self.allowed_checks as f64 / total as f64
        }
    }
}

/// Metrics collector
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Recent resolution latencies (ms)
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(1_024))),
            max_samples: 10_000,
        }
    }

    pub async fn record_cache_hit(&self) {
        self.metrics.write().await.cache_hits += 1;
    }

    pub async fn record_cache_miss(&self) {
        self.metrics.write().await.cache_misses += 1;
    }

    /// Record an authorization check outcome
    pub async fn record_check(&self, allowed: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.total_checks += 1;

        if allowed {
            metrics.allowed_checks += 1;
        } else {
            metrics.denied_checks += 1;
        }
    }

    /// Record a completed resolution and its latency
    pub async fn record_resolution(&self, latency: Duration) {
        {
            let mut samples = self.latency_samples.write().await;
            samples.push(latency.as_secs_f64() * 1000.0);
            if samples.len() > self.max_samples {
                samples.drain(0..self.max_samples / 10);
            }
        }

        self.metrics.write().await.resolutions += 1;
    }

    pub async fn record_error(&self) {
        self.metrics.write().await.error_count += 1;
    }

    /// Get current metrics snapshot
    ///
    /// Latency figures are computed here, from the retained samples.
    pub async fn snapshot(&self) -> EngineMetrics {
        let mut metrics = self.metrics.read().await.clone();

        let mut sorted = self.latency_samples.read().await.clone();
        if !sorted.is_empty() {
            sorted.sort_by(|a, b| a.total_cmp(b));
            metrics.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
            metrics.latency_p95_ms = Self::percentile(&sorted, 0.95);
            metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
        }

        metrics
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = EngineMetrics::default();
        self.latency_samples.write().await.clear();
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let index = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}
