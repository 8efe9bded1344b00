//! Distributed tracing over OTLP.
//!
//! # Responsibilities
//! - Install a tracer provider exporting through the collector connection
//! - Start spans carrying the resource attributes plus per-call extras
//! - Extract W3C trace context from inbound HTTP headers
//!
//! # Design Decisions
//! - Always-on sampling with random ids
//! - Base span attributes are immutable and copied per call, never appended to
//! - Parents are explicit; there is no implicit current context

use std::error::Error;
use std::sync::Arc;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{
    SpanContext, SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithTonicConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use crate::lifecycle::shutdown::ShutdownHandle;
use crate::lifecycle::state::{Lifecycle, Teardown};
use crate::net::connection::{CollectorConnection, Transport};
use crate::observability::attributes::ResourceAttributes;
use crate::observability::error::{ObservabilityError, ObservabilityResult, Subsystem};

/// The installed tracer provider.
pub struct TracerState {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
}

impl Teardown for TracerState {
    fn teardown(&self) -> ObservabilityResult<()> {
        self.provider
            .shutdown()
            .map_err(|e| ObservabilityError::exporter(Subsystem::Tracing, e))
    }
}

/// Handle returned by [`TraceExporter::initialize`].
pub type TracingShutdown = ShutdownHandle<TracerState>;

/// The process tracer.
pub struct TraceExporter {
    attributes: ResourceAttributes,
    base_attributes: Arc<[KeyValue]>,
    lifecycle: Arc<Lifecycle<TracerState>>,
}

impl TraceExporter {
    pub fn new(attributes: ResourceAttributes) -> Self {
        Self {
            base_attributes: attributes.to_key_values().into(),
            attributes,
            lifecycle: Arc::new(Lifecycle::new(Subsystem::Tracing)),
        }
    }

    /// Install a tracer tagged with the resource attributes.
    ///
    /// Re-initializing shuts down the previous provider first.
    pub fn initialize(&self, conn: Option<&CollectorConnection>) -> ObservabilityResult<TracingShutdown> {
        let conn = conn.ok_or(ObservabilityError::MissingConnection(Subsystem::Tracing))?;

        let builder = match conn.transport() {
            Transport::Grpc(channel) => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_channel(channel.clone())
                    .build()
                    .map_err(|e| ObservabilityError::exporter(Subsystem::Tracing, e))?;
                SdkTracerProvider::builder().with_batch_exporter(exporter)
            }
            Transport::InMemory(collector) => {
                SdkTracerProvider::builder().with_simple_exporter(collector.span_exporter())
            }
        };

        let resource = Resource::builder()
            .with_service_name(self.attributes.service_name().to_string())
            .with_attributes(self.attributes.to_key_values())
            .build();

        let provider = builder
            .with_resource(resource)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .build();
        let tracer = provider.tracer(self.attributes.service_name().to_string());

        let generation = self.lifecycle.install(TracerState { provider, tracer });

        tracing::info!(collector = %conn.target(), "Tracer initialized");
        Ok(ShutdownHandle::new(self.lifecycle.clone(), generation))
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }

    /// Fail with the abort error kind unless tracing is initialized.
    pub fn ensure_initialized(&self) -> ObservabilityResult<()> {
        self.lifecycle.current().map(|_| ())
    }

    /// Start a span as a child of `parent`'s span, or as a new root.
    ///
    /// The span carries the base attributes followed by `extra`.
    pub fn start(
        &self,
        parent: Option<&Context>,
        name: &str,
        kind: SpanKind,
        extra: &[KeyValue],
    ) -> ObservabilityResult<ActiveSpan> {
        let state = self.lifecycle.current()?;

        let mut attributes = Vec::with_capacity(self.base_attributes.len() + extra.len());
        attributes.extend_from_slice(&self.base_attributes);
        attributes.extend_from_slice(extra);

        let parent_cx = parent.cloned().unwrap_or_else(Context::new);
        let span = state
            .tracer
            .span_builder(name.to_string())
            .with_kind(kind)
            .with_attributes(attributes)
            .start_with_context(&state.tracer, &parent_cx);

        Ok(ActiveSpan {
            cx: parent_cx.with_span(span),
        })
    }

    /// Attributes every span starts with.
    pub fn base_attributes(&self) -> &[KeyValue] {
        &self.base_attributes
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle<TracerState>> {
        &self.lifecycle
    }
}

/// A started span together with the context that carries it.
#[derive(Debug, Clone)]
pub struct ActiveSpan {
    cx: Context,
}

impl ActiveSpan {
    /// Context to pass as parent for child spans and to the log sink.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn span_context(&self) -> SpanContext {
        self.cx.span().span_context().clone()
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Mark the span successful and end it. No-op once ended.
    pub fn end_ok(&self) {
        let span = self.cx.span();
        span.set_status(Status::Ok);
        span.end();
    }

    /// Record `err`, mark the span failed and end it. No-op once ended.
    pub fn end_error(&self, err: &dyn Error) {
        let span = self.cx.span();
        span.record_error(err);
        span.set_status(Status::error(err.to_string()));
        span.end();
    }
}

/// Parent context from W3C `traceparent`/`tracestate` headers.
///
/// Returns an empty context when the headers carry no valid trace.
pub fn extract_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract_with_context(&Context::new(), &HeaderExtractor(headers))
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
