//! Metrics export over OTLP.
//!
//! # Responsibilities
//! - Install a meter provider exporting through the collector connection
//! - Scope the meter as `<namespace>.<service>` with the resource attributes
//! - Create namespaced instruments and keep a registry of them
//!
//! # Instruments
//! - Counters (`u64`), up/down counters (`i64`) and histograms (`f64`)
//! - Full name: `<namespace>.<service>.<name>`
//!
//! # Design Decisions
//! - Precondition failures are reported before any network activity
//! - Instrument constructors fail with `NotInitialized` instead of returning no-ops
//! - The periodic reader owns batching; nothing is buffered here

use std::sync::Arc;

use dashmap::DashMap;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _, UpDownCounter};
use opentelemetry::InstrumentationScope;
use opentelemetry_otlp::WithTonicConfig;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;

use crate::lifecycle::shutdown::ShutdownHandle;
use crate::lifecycle::state::{Lifecycle, Teardown};
use crate::net::connection::{CollectorConnection, Transport};
use crate::observability::attributes::ResourceAttributes;
use crate::observability::error::{ObservabilityError, ObservabilityResult, Subsystem};

/// Unit attached to every instrument.
const DEFAULT_UNIT: &str = "1";

/// Kind of a registered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Histogram,
}

/// The installed meter provider and its instrument registry.
pub struct MeterState {
    provider: SdkMeterProvider,
    meter: Meter,
    prefix: String,
    instruments: DashMap<String, InstrumentKind>,
}

impl MeterState {
    fn full_name(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    fn register(&self, name: &str, kind: InstrumentKind) {
        self.instruments.insert(name.to_string(), kind);
    }
}

impl Teardown for MeterState {
    fn teardown(&self) -> ObservabilityResult<()> {
        self.instruments.clear();
        self.provider
            .shutdown()
            .map_err(|e| ObservabilityError::exporter(Subsystem::Metrics, e))
    }
}

/// Handle returned by [`MetricsExporter::initialize`].
pub type MetricsShutdown = ShutdownHandle<MeterState>;

/// The process meter and instrument factory.
pub struct MetricsExporter {
    attributes: ResourceAttributes,
    lifecycle: Arc<Lifecycle<MeterState>>,
}

impl MetricsExporter {
    pub fn new(attributes: ResourceAttributes) -> Self {
        Self {
            attributes,
            lifecycle: Arc::new(Lifecycle::new(Subsystem::Metrics)),
        }
    }

    /// Install a meter scoped to `<namespace>.<service>`.
    ///
    /// Fails with [`ObservabilityError::MissingConnection`] or
    /// [`ObservabilityError::EmptyNamespace`] before any network activity.
    /// Re-initializing shuts down the previous provider first.
    pub fn initialize(
        &self,
        namespace: &str,
        conn: Option<&CollectorConnection>,
    ) -> ObservabilityResult<MetricsShutdown> {
        let conn = conn.ok_or(ObservabilityError::MissingConnection(Subsystem::Metrics))?;
        if namespace.is_empty() {
            return Err(ObservabilityError::EmptyNamespace);
        }

        let resource = Resource::builder()
            .with_service_name(self.attributes.service_name().to_string())
            .with_attributes(self.attributes.to_key_values())
            .build();

        let provider = match conn.transport() {
            Transport::Grpc(channel) => {
                let exporter = opentelemetry_otlp::MetricExporter::builder()
                    .with_tonic()
                    .with_channel(channel.clone())
                    .build()
                    .map_err(|e| ObservabilityError::exporter(Subsystem::Metrics, e))?;
                build_provider(exporter, resource)
            }
            Transport::InMemory(collector) => build_provider(collector.metric_exporter(), resource),
        };

        let prefix = format!("{}.{}", namespace, self.attributes.service_name());
        let scope = InstrumentationScope::builder(prefix.clone())
            .with_version(self.attributes.version().to_string())
            .with_attributes(self.attributes.to_key_values())
            .build();
        let meter = provider.meter_with_scope(scope);

        let generation = self.lifecycle.install(MeterState {
            provider,
            meter,
            prefix: prefix.clone(),
            instruments: DashMap::new(),
        });

        tracing::info!(scope = %prefix, collector = %conn.target(), "Metrics initialized");
        Ok(ShutdownHandle::new(self.lifecycle.clone(), generation))
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }

    /// Fail with the abort error kind unless metrics are initialized.
    pub fn ensure_initialized(&self) -> ObservabilityResult<()> {
        self.lifecycle.current().map(|_| ())
    }

    /// Monotonic counter named `<namespace>.<service>.<name>`.
    pub fn new_counter(&self, name: &str, description: &str) -> ObservabilityResult<Counter<u64>> {
        let state = self.lifecycle.current()?;
        let full_name = state.full_name(name);
        state.register(&full_name, InstrumentKind::Counter);
        tracing::debug!(name = %full_name, "New counter created");

        Ok(state
            .meter
            .u64_counter(full_name)
            .with_description(description.to_string())
            .with_unit(DEFAULT_UNIT)
            .build())
    }

    /// Up/down counter named `<namespace>.<service>.<name>`.
    pub fn new_up_down_counter(
        &self,
        name: &str,
        description: &str,
    ) -> ObservabilityResult<UpDownCounter<i64>> {
        let state = self.lifecycle.current()?;
        let full_name = state.full_name(name);
        state.register(&full_name, InstrumentKind::UpDownCounter);
        tracing::debug!(name = %full_name, "New up/down counter created");

        Ok(state
            .meter
            .i64_up_down_counter(full_name)
            .with_description(description.to_string())
            .with_unit(DEFAULT_UNIT)
            .build())
    }

    /// Histogram named `<namespace>.<service>.<name>`.
    pub fn new_histogram(&self, name: &str, description: &str) -> ObservabilityResult<Histogram<f64>> {
        let state = self.lifecycle.current()?;
        let full_name = state.full_name(name);
        state.register(&full_name, InstrumentKind::Histogram);
        tracing::debug!(name = %full_name, "New histogram created");

        Ok(state
            .meter
            .f64_histogram(full_name)
            .with_description(description.to_string())
            .with_unit(DEFAULT_UNIT)
            .build())
    }

    /// Registered instruments, sorted by name. Empty when uninitialized.
    pub fn instruments(&self) -> Vec<(String, InstrumentKind)> {
        let Ok(state) = self.lifecycle.current() else {
            return Vec::new();
        };
        let mut instruments: Vec<_> = state
            .instruments
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        instruments.sort_by(|a, b| a.0.cmp(&b.0));
        instruments
    }

    /// Export everything recorded so far. Blocks until the exporter returns.
    pub fn force_flush(&self) -> ObservabilityResult<()> {
        let state = self.lifecycle.current()?;
        state
            .provider
            .force_flush()
            .map_err(|e| ObservabilityError::exporter(Subsystem::Metrics, e))
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle<MeterState>> {
        &self.lifecycle
    }
}

fn build_provider<E: PushMetricExporter>(exporter: E, resource: Resource) -> SdkMeterProvider {
    SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter).build())
        .with_resource(resource)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::test_config;
    use std::time::Duration;

    fn exporter() -> MetricsExporter {
        MetricsExporter::new(ResourceAttributes::derive(&test_config()))
    }

    #[test]
    fn test_missing_connection() {
        let err = exporter().initialize("ns", None).unwrap_err();
        assert!(matches!(err, ObservabilityError::MissingConnection(Subsystem::Metrics)));
    }

    #[tokio::test]
    async fn test_empty_namespace_before_network() {
        // Nothing listens here; the check must fail before any dial is attempted.
        let conn = CollectorConnection::lazy("127.0.0.1:9").unwrap();
        let metrics = exporter();

        let err = metrics.initialize("", Some(&conn)).unwrap_err();
        assert!(matches!(err, ObservabilityError::EmptyNamespace));
        assert!(!metrics.is_initialized());
    }

    #[test]
    fn test_constructors_before_initialize() {
        let metrics = exporter();

        assert!(metrics.new_counter("c", "d").unwrap_err().is_abort());
        assert!(metrics.new_up_down_counter("u", "d").unwrap_err().is_abort());
        assert!(metrics.new_histogram("h", "d").unwrap_err().is_abort());
        assert!(metrics.instruments().is_empty());
    }

    #[tokio::test]
    async fn test_instruments_are_namespaced() {
        let conn = CollectorConnection::in_memory();
        let metrics = exporter();
        let shutdown = metrics.initialize("acme", Some(&conn)).unwrap();

        let counter = metrics.new_counter("jobs", "Jobs processed.").unwrap();
        let gauge = metrics.new_up_down_counter("queue", "Queue depth.").unwrap();
        let histogram = metrics.new_histogram("latency", "Latency.").unwrap();
        counter.add(1, &[]);
        gauge.add(-1, &[]);
        histogram.record(0.5, &[]);

        assert_eq!(
            metrics.instruments(),
            vec![
                ("acme.unit-tests.jobs".to_string(), InstrumentKind::Counter),
                ("acme.unit-tests.latency".to_string(), InstrumentKind::Histogram),
                ("acme.unit-tests.queue".to_string(), InstrumentKind::UpDownCounter),
            ]
        );

        metrics.force_flush().unwrap();
        assert!(!conn.collector().unwrap().finished_metrics().is_empty());

        shutdown.shutdown(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_twice_then_constructors_fail() {
        let conn = CollectorConnection::in_memory();
        let metrics = exporter();
        let shutdown = metrics.initialize("acme", Some(&conn)).unwrap();
        metrics.new_counter("jobs", "Jobs processed.").unwrap();

        shutdown.shutdown(Duration::from_secs(5)).await.unwrap();
        shutdown.shutdown(Duration::from_secs(5)).await.unwrap();

        assert!(!metrics.is_initialized());
        assert!(metrics.instruments().is_empty());
        assert!(metrics.new_counter("jobs", "Jobs processed.").unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_provider() {
        let conn = CollectorConnection::in_memory();
        let metrics = exporter();
        let first = metrics.initialize("acme", Some(&conn)).unwrap();
        let second = metrics.initialize("other", Some(&conn)).unwrap();

        // The stale handle must not tear down the newer install.
        first.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(metrics.is_initialized());

        metrics.new_counter("jobs", "d").unwrap();
        assert_eq!(metrics.instruments()[0].0, "other.unit-tests.jobs");

        second.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(!metrics.is_initialized());
    }
}
