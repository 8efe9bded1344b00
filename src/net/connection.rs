//! Collector connection handed to the metrics and tracing exporters.
//!
//! # Responsibilities
//! - Dial the OTLP collector over gRPC, blocking with a timeout or lazily
//! - Provide an in-memory collector for local runs and tests
//! - Let both exporters share one underlying channel
//!
//! # Design Decisions
//! - The connection is created by the host and passed in explicitly
//! - No retry or backoff here; tonic reconnects a lazy channel on demand
//! - Endpoints without a scheme are dialed as plaintext `http://`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use tonic::transport::{Channel, Endpoint};

use crate::observability::error::{ObservabilityError, ObservabilityResult};

/// Default time a blocking dial waits for the collector.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for connecting to the OpenTelemetry collector.
#[derive(Debug, Clone)]
pub struct GrpcConnectionOptions {
    /// Collector address, `host:port` or a full URI.
    pub endpoint: String,
    /// Wait until the connection is established before returning.
    pub wait_for_connect: bool,
    /// Upper bound for the blocking connect.
    pub timeout: Duration,
}

impl GrpcConnectionOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            wait_for_connect: false,
            timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    pub fn wait_for_connect(mut self, timeout: Duration) -> Self {
        self.wait_for_connect = true;
        self.timeout = timeout;
        self
    }
}

/// Span exporter that appends every exported batch to a shared buffer.
///
/// Shutting the tracer provider down leaves the buffer intact, so spans
/// flushed by the final shutdown stay readable afterwards.
#[derive(Clone, Debug, Default)]
pub(crate) struct CollectedSpans {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl CollectedSpans {
    fn snapshot(&self) -> Vec<SpanData> {
        self.spans.lock().map(|spans| spans.clone()).unwrap_or_default()
    }

    fn clear(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }
}

impl SpanExporter for CollectedSpans {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        self.spans
            .lock()
            .map(|mut spans| spans.extend(batch))
            .map_err(|_| OTelSdkError::InternalFailure("span buffer poisoned".to_string()))
    }
}

/// Exporters that keep finished telemetry in memory.
///
/// Records survive provider shutdown; only [`InMemoryCollector::reset`]
/// clears them.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCollector {
    spans: CollectedSpans,
    metrics: InMemoryMetricExporter,
}

impl InMemoryCollector {
    pub(crate) fn span_exporter(&self) -> CollectedSpans {
        self.spans.clone()
    }

    // InMemoryMetricExporter keeps its batches on shutdown.
    pub(crate) fn metric_exporter(&self) -> InMemoryMetricExporter {
        self.metrics.clone()
    }

    /// Spans that have ended so far.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.snapshot()
    }

    /// Metric batches exported so far (on flush or shutdown).
    pub fn finished_metrics(&self) -> Vec<ResourceMetrics> {
        self.metrics.get_finished_metrics().unwrap_or_default()
    }

    pub fn reset(&self) {
        self.spans.clear();
        self.metrics.reset();
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Transport {
    Grpc(Channel),
    InMemory(InMemoryCollector),
}

/// An established (or lazily established) link to the collector.
#[derive(Clone, Debug)]
pub struct CollectorConnection {
    target: String,
    transport: Transport,
}

impl CollectorConnection {
    /// Dial the collector described by `opts`.
    ///
    /// With `wait_for_connect` the call returns only once the connection is
    /// up, or fails with [`ObservabilityError::DialTimeout`]. Otherwise the
    /// channel connects on first use.
    pub async fn dial(opts: GrpcConnectionOptions) -> ObservabilityResult<Self> {
        let target = normalize_endpoint(&opts.endpoint);
        tracing::debug!(endpoint = %target, "Connecting to observability endpoint");

        let endpoint = endpoint_for(&target)?.connect_timeout(opts.timeout);

        if !opts.wait_for_connect {
            return Ok(Self {
                transport: Transport::Grpc(endpoint.connect_lazy()),
                target,
            });
        }

        let channel = match tokio::time::timeout(opts.timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(source)) => return Err(ObservabilityError::Dial { target, source }),
            Err(_) => {
                return Err(ObservabilityError::DialTimeout {
                    target,
                    timeout: opts.timeout,
                })
            }
        };

        tracing::info!(endpoint = %target, "Connected to observability endpoint");
        Ok(Self {
            target,
            transport: Transport::Grpc(channel),
        })
    }

    /// A channel that connects on first use. Must be called inside a Tokio runtime.
    pub fn lazy(endpoint: &str) -> ObservabilityResult<Self> {
        let target = normalize_endpoint(endpoint);
        let channel = endpoint_for(&target)?.connect_lazy();
        Ok(Self {
            target,
            transport: Transport::Grpc(channel),
        })
    }

    /// A connection backed by an in-memory collector.
    pub fn in_memory() -> Self {
        Self {
            target: "in-memory".to_string(),
            transport: Transport::InMemory(InMemoryCollector::default()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The in-memory collector, when this connection has one.
    pub fn collector(&self) -> Option<&InMemoryCollector> {
        match &self.transport {
            Transport::InMemory(collector) => Some(collector),
            Transport::Grpc(_) => None,
        }
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }
}

fn endpoint_for(target: &str) -> ObservabilityResult<Endpoint> {
    Endpoint::from_shared(target.to_string()).map_err(|source| ObservabilityError::Dial {
        target: target.to_string(),
        source,
    })
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}
