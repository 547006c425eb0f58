//! Request metrics for the shortener service.
//!
//! [`Metrics`] keeps its own atomic counters so the service can report them
//! directly (`/debug/vars`), and mirrors every update to the `metrics` facade
//! for the Prometheus exporter.
//!
//! Metric names follow Prometheus conventions:
//! - `shortener_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The concurrency gauge is refreshed once every this many requests.
pub const CONCURRENCY_SAMPLE_INTERVAL: u64 = 1000;

/// Initialize the Prometheus metrics recorder and return the handle used to
/// render `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("shortener_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Process-wide request counters.
///
/// Created once in `main` and shared as `Arc<Metrics>`. Every method is safe
/// under arbitrary concurrency.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
    in_flight: AtomicI64,
    concurrency: AtomicI64,
}

/// Point-in-time view of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub panics: u64,
    pub in_flight: i64,
    pub concurrency: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request. Returns the new total.
    pub fn add_request(&self) -> u64 {
        counter!("shortener_http_requests_total").increment(1);
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one failed request. Returns the new total.
    pub fn add_error(&self) -> u64 {
        counter!("shortener_http_errors_total").increment(1);
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one recovered panic. Returns the new total.
    pub fn add_panic(&self) -> u64 {
        counter!("shortener_http_panics_total").increment(1);
        self.panics.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark a request as in flight until the guard is dropped.
    pub fn track_in_flight(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            metrics: Arc::clone(self),
        }
    }

    /// Sample the current in-flight count into the concurrency gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn refresh_concurrency(&self) -> i64 {
        let current = self.in_flight.load(Ordering::Relaxed);
        self.concurrency.store(current, Ordering::Relaxed);
        gauge!("shortener_concurrent_requests").set(current as f64);
        current
    }

    /// Record how long one request took.
    pub fn record_duration(&self, duration: Duration) {
        histogram!("shortener_http_request_duration_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            concurrency: self.concurrency.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the in-flight count on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    metrics: Arc<Metrics>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
