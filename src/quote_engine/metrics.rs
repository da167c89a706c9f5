// Performance metrics for the Quote Engine
//
// Tracks cache tier hit rates, fallback usage, and operation timings so the
// effect of the cache policy on real traffic stays observable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Performance threshold for slow operations (100ms)
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Quote engine metrics, cheap to clone and share
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    // Cache tier outcomes
    precomputed_hits: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Fallback chain outcomes
    approximations: AtomicU64,
    authoritative_calls: AtomicU64,
    fallback_envelopes: AtomicU64,

    // Operation counts and timings (microseconds)
    quote_resolutions: AtomicU64,
    total_quote_time_us: AtomicU64,
    slow_quote_resolutions: AtomicU64,
    capacity_checks: AtomicU64,
    total_capacity_time_us: AtomicU64,
    slow_capacity_checks: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                precomputed_hits: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
                cache_misses: AtomicU64::new(0),
                approximations: AtomicU64::new(0),
                authoritative_calls: AtomicU64::new(0),
                fallback_envelopes: AtomicU64::new(0),
                quote_resolutions: AtomicU64::new(0),
                total_quote_time_us: AtomicU64::new(0),
                slow_quote_resolutions: AtomicU64::new(0),
                capacity_checks: AtomicU64::new(0),
                total_capacity_time_us: AtomicU64::new(0),
                slow_capacity_checks: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_precomputed_hit(&self) {
        self.inner.precomputed_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approximation(&self) {
        self.inner.approximations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authoritative_call(&self) {
        self.inner.authoritative_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_envelope(&self) {
        self.inner.fallback_envelopes.fetch_add(1, Ordering::Relaxed);
    }

    /// Hit rate across both cache tiers (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.precomputed_hits.load(Ordering::Relaxed)
            + self.inner.cache_hits.load(Ordering::Relaxed);
        let total = hits + self.inner.cache_misses.load(Ordering::Relaxed);

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing a quote resolution
    pub fn start_quote_resolution(&self) -> OperationTimer {
        OperationTimer::new(OperationType::Quote, self.clone())
    }

    /// Start timing a capacity check
    pub fn start_capacity_check(&self) -> OperationTimer {
        OperationTimer::new(OperationType::Capacity, self.clone())
    }

    fn record_quote_resolution(&self, duration: Duration) {
        self.inner.quote_resolutions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_quote_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner
                .slow_quote_resolutions
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow quote resolution: {}ms", duration.as_millis());
        }
    }

    fn record_capacity_check(&self, duration: Duration) {
        self.inner.capacity_checks.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_capacity_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner
                .slow_capacity_checks
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow capacity check: {}ms", duration.as_millis());
        }
    }

    pub fn avg_quote_time_ms(&self) -> f64 {
        let count = self.inner.quote_resolutions.load(Ordering::Relaxed);
        let total_us = self.inner.total_quote_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn avg_capacity_time_ms(&self) -> f64 {
        let count = self.inner.capacity_checks.load(Ordering::Relaxed);
        let total_us = self.inner.total_capacity_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cache_hit_rate: self.cache_hit_rate(),
            precomputed_hits: self.inner.precomputed_hits.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.cache_misses.load(Ordering::Relaxed),
            approximations: self.inner.approximations.load(Ordering::Relaxed),
            authoritative_calls: self.inner.authoritative_calls.load(Ordering::Relaxed),
            fallback_envelopes: self.inner.fallback_envelopes.load(Ordering::Relaxed),
            quote_resolutions: self.inner.quote_resolutions.load(Ordering::Relaxed),
            avg_quote_time_ms: self.avg_quote_time_ms(),
            slow_quote_resolutions: self.inner.slow_quote_resolutions.load(Ordering::Relaxed),
            capacity_checks: self.inner.capacity_checks.load(Ordering::Relaxed),
            avg_capacity_time_ms: self.avg_capacity_time_ms(),
            slow_capacity_checks: self.inner.slow_capacity_checks.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Quote Engine Metrics:\n\
             Cache: {:.1}% hit rate ({} precomputed, {} cached, {} misses)\n\
             Fallbacks: {} approximations, {} authoritative calls, {} minimal envelopes\n\
             Quotes: {} resolutions, avg {:.2}ms, {} slow\n\
             Capacity: {} checks, avg {:.2}ms, {} slow",
            summary.cache_hit_rate * 100.0,
            summary.precomputed_hits,
            summary.cache_hits,
            summary.cache_misses,
            summary.approximations,
            summary.authoritative_calls,
            summary.fallback_envelopes,
            summary.quote_resolutions,
            summary.avg_quote_time_ms,
            summary.slow_quote_resolutions,
            summary.capacity_checks,
            summary.avg_capacity_time_ms,
            summary.slow_capacity_checks,
        );
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum OperationType {
    Quote,
    Capacity,
}

/// Timer for tracking operation duration, records on drop
pub struct OperationTimer {
    start: Instant,
    operation_type: OperationType,
    metrics: EngineMetrics,
}

impl OperationTimer {
    fn new(operation_type: OperationType, metrics: EngineMetrics) -> Self {
        Self {
            start: Instant::now(),
            operation_type,
            metrics,
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();

        match self.operation_type {
            OperationType::Quote => self.metrics.record_quote_resolution(duration),
            OperationType::Capacity => self.metrics.record_capacity_check(duration),
        }
    }
}

/// Summary of quote engine metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub cache_hit_rate: f64,
    pub precomputed_hits: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub approximations: u64,
    pub authoritative_calls: u64,
    pub fallback_envelopes: u64,
    pub quote_resolutions: u64,
    pub avg_quote_time_ms: f64,
    pub slow_quote_resolutions: u64,
    pub capacity_checks: u64,
    pub avg_capacity_time_ms: f64,
    pub slow_capacity_checks: u64,
}
