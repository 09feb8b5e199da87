//! Prometheus metrics for stockq.
//!
//! Covers pipeline runs (outcome counts, durations, lines read, matches)
//! and controller toggles.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure here means duplicate metric
//! names, which is a programming error caught on first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

/// Pipeline runs by terminal outcome (success/cancelled/failed).
pub static PIPELINE_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stockq_pipeline_runs_total",
        "Total pipeline runs by terminal outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Pipeline wall-clock duration in milliseconds.
pub static PIPELINE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "stockq_pipeline_duration_ms",
        "Pipeline run duration in milliseconds",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0]
    )
    .unwrap()
});

/// Raw lines read from sources, header included.
pub static LINES_READ_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("stockq_lines_read_total", "Total raw lines read from sources").unwrap()
});

/// Records that matched the requested identifier in successful runs.
pub static RECORDS_MATCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "stockq_records_matched_total",
        "Total records returned by successful runs"
    )
    .unwrap()
});

/// Controller toggles by resulting action (started/cancel_requested/ignored).
pub static TOGGLE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stockq_toggle_total",
        "Controller toggles by resulting action",
        &["action"]
    )
    .unwrap()
});

/// Pipelines currently in flight (0 or 1 per controller).
pub static PIPELINES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "stockq_pipelines_in_flight",
        "Pipelines currently in flight"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a pipeline start.
    pub fn pipeline_started() {
        PIPELINES_IN_FLIGHT.inc();
    }

    /// Record a pipeline terminal outcome.
    pub fn pipeline_finished(outcome: &str, duration_ms: f64) {
        PIPELINES_IN_FLIGHT.dec();
        PIPELINE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
        PIPELINE_DURATION_MS
            .with_label_values(&[outcome])
            .observe(duration_ms);
    }

    /// Record lines read by one run.
    pub fn lines_read(count: u64) {
        LINES_READ_TOTAL.inc_by(count);
    }

    /// Record records returned by one successful run.
    pub fn records_matched(count: u64) {
        RECORDS_MATCHED_TOTAL.inc_by(count);
    }

    /// Record a controller toggle.
    pub fn toggle(action: &str) {
        TOGGLE_TOTAL.with_label_values(&[action]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
