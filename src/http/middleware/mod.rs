//! Request instrumentation middleware.
//!
//! # Request Flow
//! ```text
//! inbound request
//!     → trace.rs   (start `inbound-request` server span, parent from traceparent)
//!     → logging.rs (log `inbound-request` with span context and request metadata)
//!     → metrics.rs (active/total counters, duration histogram)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - The chain refuses to build unless all three subsystems are initialized
//! - HTTP instruments are created once, when the chain is built
//! - Span status follows the final response status (>= 500 is an error)

pub mod logging;
pub mod metrics;
pub mod trace;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::observability::{ObservabilityResult, Telemetry};

pub use self::metrics::HttpMetrics;

/// Name of the server span and of the request log entry.
pub const INBOUND_REQUEST: &str = "inbound-request";

/// Tracing, logging and metrics middleware for one service.
#[derive(Clone)]
pub struct MiddlewareChain {
    telemetry: Telemetry,
    metrics: HttpMetrics,
}

impl MiddlewareChain {
    /// Build the full chain.
    ///
    /// Fails with the abort error kind if logging, metrics or tracing has not
    /// been initialized.
    pub fn full(telemetry: &Telemetry) -> ObservabilityResult<Self> {
        telemetry.traces().ensure_initialized()?;
        telemetry.logs().ensure_initialized()?;
        telemetry.metrics().ensure_initialized()?;

        let metrics = HttpMetrics::new(telemetry.metrics())?;
        Ok(Self {
            telemetry: telemetry.clone(),
            metrics,
        })
    }

    /// Wrap every route of `router`. Tracing runs first, metrics last.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // Layers added later run earlier.
        router
            .layer(from_fn_with_state(self.metrics.clone(), metrics::record_metrics))
            .layer(from_fn_with_state(self.telemetry.clone(), logging::log_request))
            .layer(from_fn_with_state(self.telemetry.clone(), trace::trace_request))
    }

    pub fn http_metrics(&self) -> &HttpMetrics {
        &self.metrics
    }
}
