//! HTTP request instruments.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};

use crate::observability::{MetricsExporter, ObservabilityResult};

pub const ACTIVE_REQUESTS: &str = "http.active_requests";
pub const TOTAL_REQUESTS: &str = "http.total_requests_served";
pub const REQUEST_DURATION: &str = "http.request_duration_seconds";

/// Instruments shared by every request.
#[derive(Clone)]
pub struct HttpMetrics {
    active: UpDownCounter<i64>,
    total: Counter<u64>,
    duration: Histogram<f64>,
}

impl HttpMetrics {
    pub fn new(metrics: &MetricsExporter) -> ObservabilityResult<Self> {
        Ok(Self {
            active: metrics.new_up_down_counter(
                ACTIVE_REQUESTS,
                "The current number of active requests being served.",
            )?,
            total: metrics.new_counter(TOTAL_REQUESTS, "The total number of requests served.")?,
            duration: metrics.new_histogram(REQUEST_DURATION, "The request duration in seconds.")?,
        })
    }
}

/// Counts a request as active until dropped, then records its duration.
struct InFlight<'a> {
    metrics: &'a HttpMetrics,
    started: Instant,
}

impl<'a> InFlight<'a> {
    fn start(metrics: &'a HttpMetrics) -> Self {
        metrics.active.add(1, &[]);
        metrics.total.add(1, &[]);
        Self {
            metrics,
            started: Instant::now(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.active.add(-1, &[]);
        self.metrics
            .duration
            .record(self.started.elapsed().as_secs_f64(), &[]);
    }
}

/// Record request counters and duration; the guard runs even if the handler
/// future is dropped.
pub async fn record_metrics(State(metrics): State<HttpMetrics>, request: Request, next: Next) -> Response {
    let _in_flight = InFlight::start(&metrics);
    next.run(request).await
}
