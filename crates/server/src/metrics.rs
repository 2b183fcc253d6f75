//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Dossier server:
//! - HTTP request metrics (latency, counts, in-flight)
//! - Task counts by status (collected dynamically)
//! - Detail cache size (collected dynamically)
//!
//! Core metrics (collector, ledger, cache, provider) are registered into the
//! same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dossier_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dossier_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics (collected dynamically)
// =============================================================================

/// Tasks by current status.
pub static TASKS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("dossier_tasks_by_status", "Current task count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics (collected dynamically)
// =============================================================================

/// Total detail cache entries, including expired ones not yet purged.
pub static CACHE_TOTAL_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dossier_cache_total_entries",
        "Number of entries in the detail cache",
    )
    .unwrap()
});

/// Live (unexpired) detail cache entries.
pub static CACHE_LIVE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dossier_cache_live_entries",
        "Number of unexpired entries in the detail cache",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tasks
    registry
        .register(Box::new(TASKS_BY_STATUS.clone()))
        .unwrap();

    // Cache
    registry
        .register(Box::new(CACHE_TOTAL_ENTRIES.clone()))
        .unwrap();
    registry
        .register(Box::new(CACHE_LIVE_ENTRIES.clone()))
        .unwrap();

    // Core metrics (collector, ledger, cache, provider)
    for metric in dossier_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding metrics to update gauges with current values from
/// the task store and cache.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for status in [
        "pending",
        "running",
        "completed",
        "failed",
        "cancelled",
        "insufficient_credits",
    ] {
        let filter = dossier_core::TaskFilter::new().with_status(status);
        if let Ok(count) = state.task_store().count(&filter) {
            TASKS_BY_STATUS.with_label_values(&[status]).set(count);
        }
    }

    if let Ok(stats) = state.cache().stats() {
        CACHE_TOTAL_ENTRIES.set(stats.total_entries);
        CACHE_LIVE_ENTRIES.set(stats.live_entries);
    }
}
