//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedConfig
//!     → attributes.rs (ResourceAttributes, derived once)
//!     → logging/ (JSON entries, std-fields and trace hooks)
//!     → metrics.rs (meter scoped <namespace>.<service>, OTLP export)
//!     → tracing.rs (tracer with resource attributes, OTLP export)
//!
//! Telemetry handle:
//!     owns all three, shared with request handlers as axum state
//! ```
//!
//! # Design Decisions
//! - No process globals: each `Telemetry` is built explicitly and injected
//! - Every subsystem goes through the same lifecycle state machine
//! - One attribute set feeds all three so their tags never drift apart

pub mod attributes;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResolvedConfig;

pub use attributes::ResourceAttributes;
pub use error::{ObservabilityError, ObservabilityResult, Subsystem};
pub use logging::{Attribute, LogHook, LogOutput, LogSink, SinkLayer, StdFieldsHook, TraceHook};
pub use metrics::{InstrumentKind, MetricsExporter, MetricsShutdown};
pub use self::tracing::{ActiveSpan, TraceExporter, TracingShutdown};

/// The logging, metrics and tracing subsystems of one service.
///
/// Cloning is cheap and every clone refers to the same subsystems.
#[derive(Clone)]
pub struct Telemetry {
    config: Arc<ResolvedConfig>,
    attributes: ResourceAttributes,
    logs: Arc<LogSink>,
    metrics: Arc<MetricsExporter>,
    traces: Arc<TraceExporter>,
}

impl Telemetry {
    /// Build uninitialized subsystems for `config`.
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        let attributes = ResourceAttributes::derive(&config);
        Self {
            logs: Arc::new(LogSink::new()),
            metrics: Arc::new(MetricsExporter::new(attributes.clone())),
            traces: Arc::new(TraceExporter::new(attributes.clone())),
            attributes,
            config,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn attributes(&self) -> &ResourceAttributes {
        &self.attributes
    }

    pub fn logs(&self) -> &Arc<LogSink> {
        &self.logs
    }

    pub fn metrics(&self) -> &MetricsExporter {
        &self.metrics
    }

    pub fn traces(&self) -> &TraceExporter {
        &self.traces
    }

    /// Initialize the log sink at the configured level with the standard hooks.
    pub fn init_logging(&self, output: LogOutput) {
        let hooks: Vec<Arc<dyn LogHook>> = vec![
            Arc::new(StdFieldsHook::new(self.attributes.clone())),
            Arc::new(TraceHook),
        ];
        self.logs.initialize(output, self.config.log_level(), hooks);
    }

    /// Shut down metrics, then tracing, then logging.
    ///
    /// Every subsystem is released even if an earlier one fails; the first
    /// error is returned. Uninitialized subsystems are skipped.
    pub async fn shutdown_all(&self, deadline: Duration) -> ObservabilityResult<()> {
        let metrics = self.metrics.lifecycle().release(None, deadline).await;
        let traces = self.traces.lifecycle().release(None, deadline).await;
        let logs = self.logs.reset();

        for result in [&metrics, &traces, &logs] {
            if let Err(e) = result {
                ::tracing::warn!(error = %e, "Telemetry shutdown incomplete");
            }
        }
        metrics.and(traces).and(logs)
    }
}
