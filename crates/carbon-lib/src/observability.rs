//! Observability infrastructure for the estimation engine
//!
//! Prometheus metrics for pipeline runs, estimation fallbacks and the
//! intensity cache. Counters are registered once and shared by every
//! handle clone.

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use std::sync::OnceLock;

/// Histogram buckets for pipeline run latency (in seconds)
const RUN_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    run_latency_seconds: Histogram,
    combined_metrics_produced: IntCounter,
    estimation_fallbacks: IntCounter,
    intensity_cache_hits: IntCounter,
    intensity_cache_misses: IntCounter,
    recommendations_generated: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            run_latency_seconds: register_histogram!(
                "carbon_engine_run_latency_seconds",
                "Time spent running one processing cycle",
                RUN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register run_latency_seconds"),

            combined_metrics_produced: register_int_counter!(
                "carbon_engine_combined_metrics_produced_total",
                "Total number of combined metrics produced"
            )
            .expect("Failed to register combined_metrics_produced"),

            estimation_fallbacks: register_int_counter!(
                "carbon_engine_estimation_fallbacks_total",
                "Total number of estimation fallbacks recorded"
            )
            .expect("Failed to register estimation_fallbacks"),

            intensity_cache_hits: register_int_counter!(
                "carbon_engine_intensity_cache_hits_total",
                "Intensity lookups answered from the per-run cache"
            )
            .expect("Failed to register intensity_cache_hits"),

            intensity_cache_misses: register_int_counter!(
                "carbon_engine_intensity_cache_misses_total",
                "Intensity lookups that required a repository call"
            )
            .expect("Failed to register intensity_cache_misses"),

            recommendations_generated: register_int_counter!(
                "carbon_engine_recommendations_generated_total",
                "Total number of recommendations generated"
            )
            .expect("Failed to register recommendations_generated"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a pipeline run latency observation
    pub fn observe_run_latency(&self, duration_secs: f64) {
        self.inner().run_latency_seconds.observe(duration_secs);
    }

    /// Count combined metrics emitted by a run
    pub fn add_combined_metrics_produced(&self, count: u64) {
        self.inner().combined_metrics_produced.inc_by(count);
    }

    /// Count one recorded estimation fallback reason
    pub fn inc_estimation_fallbacks(&self) {
        self.inner().estimation_fallbacks.inc();
    }

    /// Count an intensity cache hit
    pub fn inc_intensity_cache_hits(&self) {
        self.inner().intensity_cache_hits.inc();
    }

    /// Count an intensity cache miss
    pub fn inc_intensity_cache_misses(&self) {
        self.inner().intensity_cache_misses.inc();
    }

    /// Count recommendations emitted by an analysis call
    pub fn add_recommendations_generated(&self, count: u64) {
        self.inner().recommendations_generated.inc_by(count);
    }
}
