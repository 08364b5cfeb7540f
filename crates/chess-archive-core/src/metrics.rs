//! Prometheus metrics helpers for the chess archive.
//!
//! This module provides centralized metrics initialization and the metric
//! definitions recorded by the sync pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chess_archive_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics().unwrap();
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     metrics::counter!("archive_runs_total", "outcome" => "success").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`archive_`, `source_`, `sink_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only low-cardinality values (sink name, outcome), never game IDs

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install the Prometheus metrics recorder and register metric descriptions.
///
/// Must be called once at startup before any metrics are recorded. Fails if
/// a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_archive_metrics();

    Ok(handle)
}

/// Like [`init_metrics`] but returns `None` if the recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds `0.0.0.0:<port>` and serves `/metrics` from a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

/// Register descriptions for the metrics recorded by the pipeline.
///
/// Called automatically by [`init_metrics`].
fn register_archive_metrics() {
    // =========================================================================
    // Run Metrics
    // =========================================================================

    describe_counter!(
        "archive_runs_total",
        "Archive runs by outcome (label: outcome)"
    );
    describe_histogram!(
        "archive_run_duration_seconds",
        "Wall-clock duration of a full archive run"
    );
    describe_gauge!(
        "archive_watermark_played_at",
        "played_at (Unix ms) of the newest archived game after the last run"
    );
    describe_counter!(
        "archive_games_fetched_total",
        "Games listed by the remote source"
    );
    describe_counter!(
        "archive_games_deferred_total",
        "Games beyond the batch limit left for the next run"
    );
    describe_counter!(
        "archive_games_archived_total",
        "Games written to every configured sink"
    );

    // =========================================================================
    // Source Metrics
    // =========================================================================

    describe_counter!(
        "source_requests_total",
        "Requests sent to the remote game source (label: status)"
    );
    describe_histogram!(
        "source_rate_limit_wait_seconds",
        "Time spent waiting on the shared source rate limiter"
    );

    // =========================================================================
    // Sink Metrics
    // =========================================================================

    describe_counter!(
        "sink_writes_total",
        "Successful sink writes (label: sink)"
    );
    describe_counter!("sink_errors_total", "Failed sink writes (label: sink)");
    describe_histogram!(
        "sink_write_duration_seconds",
        "Time spent in a single sink put (label: sink)"
    );
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Record one finished run with its outcome label.
pub fn record_run(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("archive_runs_total", "outcome" => outcome).increment(1);
    metrics::histogram!("archive_run_duration_seconds").record(duration_secs);
}

/// Increment a counter.
///
/// Convenience wrapper around `metrics::counter!`.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Set a gauge value.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();

        // At most one should succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_record_run_does_not_panic() {
        ensure_metrics_init();
        record_run("success", 0.25);
        record_run("failure", 0.0);
    }

    #[test]
    fn test_helpers_do_not_panic() {
        ensure_metrics_init();
        increment("archive_games_fetched_total", 0);
        increment("archive_games_fetched_total", 25);
        set_gauge("archive_watermark_played_at", 1_514_505_150_384.0);
    }

    #[test]
    fn test_register_archive_metrics_does_not_panic() {
        ensure_metrics_init();
        register_archive_metrics();
        register_archive_metrics();
    }
}
