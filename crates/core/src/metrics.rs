//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (acquisitions, strategy attempts)
//! - Runtime fetcher
//! - Response streaming and scratch cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Acquisitions by terminal result.
pub static ACQUISITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipfetch_acquisitions_total", "Total acquisitions"),
        &["result"], // "success", "invalid_input", "failed"
    )
    .unwrap()
});

/// Acquisition duration in seconds, validation through output verification.
pub static ACQUISITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipfetch_acquisition_duration_seconds",
            "Duration of acquisition before streaming starts",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 240.0, 480.0]),
        &["result"],
    )
    .unwrap()
});

/// Strategy attempts by strategy and outcome.
pub static STRATEGY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipfetch_strategy_attempts_total",
            "Extraction attempts per strategy",
        ),
        &["strategy", "outcome"], // outcome: "produced", "unavailable", "failed", "timed_out"
    )
    .unwrap()
});

/// Strategies skipped because an earlier external strategy already ran.
pub static STRATEGIES_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "clipfetch_strategies_skipped_total",
            "Strategies skipped by the fallback chain",
        ),
        &["strategy"],
    )
    .unwrap()
});

// =============================================================================
// Fetcher
// =============================================================================

/// Runtime fetches by result.
pub static BINARY_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipfetch_binary_fetches_total", "Runtime binary fetches"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Streaming
// =============================================================================

/// Response streams currently open.
pub static ACTIVE_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("clipfetch_active_streams", "Download streams currently open").unwrap()
});

/// Bytes handed to response streams.
pub static BYTES_STREAMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("clipfetch_bytes_streamed_total", "Bytes streamed to callers").unwrap()
});

/// Streams closed before the last byte was sent.
pub static STREAMS_ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "clipfetch_streams_aborted_total",
        "Download streams closed before completion",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(ACQUISITIONS.clone()),
        Box::new(ACQUISITION_DURATION.clone()),
        Box::new(STRATEGY_ATTEMPTS.clone()),
        Box::new(STRATEGIES_SKIPPED.clone()),
        // Fetcher
        Box::new(BINARY_FETCHES.clone()),
        // Streaming
        Box::new(ACTIVE_STREAMS.clone()),
        Box::new(BYTES_STREAMED.clone()),
        Box::new(STREAMS_ABORTED.clone()),
    ]
}
