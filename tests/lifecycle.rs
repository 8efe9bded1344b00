//! Startup and shutdown across all subsystems.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::SpanKind;
use service_observability::observability::{LogOutput, Subsystem};
use service_observability::{Bootstrap, CollectorConnection, ObservabilityError, Telemetry};

mod common;

const DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_use_before_initialize_aborts() {
    let telemetry = Telemetry::new(Arc::new(common::test_config()));

    let err = telemetry
        .traces()
        .start(None, "early", SpanKind::Internal, &[])
        .unwrap_err();
    assert!(matches!(err, ObservabilityError::NotInitialized(Subsystem::Tracing)));
    assert!(err.is_abort());

    let err = telemetry.metrics().new_counter("jobs", "d").unwrap_err();
    assert!(matches!(err, ObservabilityError::NotInitialized(Subsystem::Metrics)));
}

#[tokio::test]
async fn test_missing_connection_is_reported_per_subsystem() {
    let telemetry = Telemetry::new(Arc::new(common::test_config()));

    assert!(matches!(
        telemetry.traces().initialize(None).unwrap_err(),
        ObservabilityError::MissingConnection(Subsystem::Tracing)
    ));
    assert!(matches!(
        telemetry.metrics().initialize("acme", None).unwrap_err(),
        ObservabilityError::MissingConnection(Subsystem::Metrics)
    ));
}

#[tokio::test]
async fn test_full_start_and_repeated_shutdown() {
    let (telemetry, conn, _buffer) = common::started_telemetry().await;

    let span = telemetry
        .traces()
        .start(None, "work", SpanKind::Internal, &[])
        .unwrap();
    span.end_ok();

    telemetry.shutdown_all(DEADLINE).await.unwrap();
    telemetry.shutdown_all(DEADLINE).await.unwrap();

    let spans = conn.collector().unwrap().finished_spans();
    assert!(spans.iter().any(|s| s.name == "work"));
    assert!(!telemetry.traces().is_initialized());
    assert!(!telemetry.metrics().is_initialized());
    assert!(!telemetry.logs().is_initialized());
}

#[tokio::test]
async fn test_subsystem_handles_are_idempotent() {
    let telemetry = Telemetry::new(Arc::new(common::test_config()));
    let conn = CollectorConnection::in_memory();

    let traces = telemetry.traces().initialize(Some(&conn)).unwrap();
    let metrics = telemetry.metrics().initialize("acme", Some(&conn)).unwrap();

    for _ in 0..2 {
        traces.shutdown(DEADLINE).await.unwrap();
        metrics.shutdown(DEADLINE).await.unwrap();
    }
    assert!(!telemetry.traces().is_initialized());
    assert!(!telemetry.metrics().is_initialized());
}

#[tokio::test]
async fn test_unreachable_collector_times_out() {
    let telemetry = Telemetry::new(Arc::new(common::resolve(
        &[],
        &[
            ("ENVIRONMENT", "test"),
            ("LOG_LEVEL", "info"),
            // TEST-NET-1, never routable.
            ("TRACE_ENDPOINT", "192.0.2.1:4317"),
            ("METRICS_ENDPOINT", "192.0.2.1:4317"),
        ],
    )));

    let err = Bootstrap::new(&telemetry, "acme")
        .log_output(LogOutput::writer(std::io::sink()))
        .wait_for_connect(Duration::from_millis(200))
        .start()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ObservabilityError::DialTimeout { .. } | ObservabilityError::Dial { .. }
    ));
    assert!(!telemetry.logs().is_initialized());
}
