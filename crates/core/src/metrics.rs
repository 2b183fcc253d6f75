//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Collector (task lifecycle, waves, filtering)
//! - Cache (hits, misses)
//! - Ledger (credits settled)
//! - External provider calls

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Task Lifecycle Metrics
// =============================================================================

/// Tasks submitted total by admission outcome.
pub static TASKS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_tasks_submitted_total", "Total tasks submitted"),
        &["outcome"], // "admitted", "insufficient_credits"
    )
    .unwrap()
});

/// Tasks finished total by terminal status.
pub static TASKS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_tasks_finished_total", "Total tasks finished"),
        &["status"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// End-to-end task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dossier_task_duration_seconds",
            "Duration from task start to terminal status",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["status"],
    )
    .unwrap()
});

/// Candidates found per task.
pub static CANDIDATES_FOUND: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "dossier_candidates_found",
            "Number of candidates found per task",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

/// Records removed by the filter pipeline, by stage.
pub static FILTERED_RECORDS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_filtered_records_total",
            "Total records removed by filtering",
        ),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Detail cache hits total.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dossier_cache_hits_total", "Total detail cache hits").unwrap()
});

/// Detail cache misses total.
pub static CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dossier_cache_misses_total", "Total detail cache misses").unwrap()
});

// =============================================================================
// Ledger Metrics
// =============================================================================

/// Credits charged total (credit cents), by billing policy.
pub static CREDITS_CHARGED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_credits_charged_total",
            "Total credit cents charged to accounts",
        ),
        &["policy"], // "postpaid_deduct", "prepaid_freeze_settle"
    )
    .unwrap()
});

/// Billing shortfalls at settlement time.
pub static BILLING_SHORTFALLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dossier_billing_shortfalls_total",
        "Total postpaid deductions that failed at settlement",
    )
    .unwrap()
});

// =============================================================================
// External Provider Metrics
// =============================================================================

/// Provider requests total.
pub static PROVIDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dossier_provider_requests_total",
            "Total lookup provider requests",
        ),
        &["operation", "status"], // operation: "search", "detail"; status: "success", "error"
    )
    .unwrap()
});

/// Provider request duration.
pub static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dossier_provider_duration_seconds",
            "Duration of lookup provider calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Task lifecycle
        Box::new(TASKS_SUBMITTED.clone()),
        Box::new(TASKS_FINISHED.clone()),
        Box::new(TASK_DURATION.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        Box::new(FILTERED_RECORDS.clone()),
        // Cache
        Box::new(CACHE_HITS.clone()),
        Box::new(CACHE_MISSES.clone()),
        // Ledger
        Box::new(CREDITS_CHARGED.clone()),
        Box::new(BILLING_SHORTFALLS.clone()),
        // Provider
        Box::new(PROVIDER_REQUESTS.clone()),
        Box::new(PROVIDER_DURATION.clone()),
    ]
}
