//! Log entries correlated with spans.

use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::trace::SpanKind;
use opentelemetry::Context;
use service_observability::observability::Attribute;

mod common;

#[tokio::test]
async fn test_recording_span_adds_ids() {
    let (telemetry, _conn, buffer) = common::started_telemetry().await;

    let span = telemetry
        .traces()
        .start(None, "checkout", SpanKind::Internal, &[])
        .unwrap();
    telemetry.logs().info_with_context(
        span.context(),
        "charged card",
        &[Attribute::new("amount", 42)],
    );
    span.end_ok();

    let lines = buffer.messages("charged card");
    assert_eq!(lines.len(), 1);
    let sc = span.span_context();
    assert_eq!(lines[0]["trace_id"], sc.trace_id().to_string());
    assert_eq!(lines[0]["span_id"], sc.span_id().to_string());
    assert_eq!(lines[0]["dd.span_id"], sc.span_id().to_string());
    assert_eq!(lines[0]["amount"], 42);
}

#[tokio::test]
async fn test_non_recording_span_adds_nothing() {
    let (telemetry, _conn, buffer) = common::started_telemetry().await;

    let remote = SpanContext::new(
        TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
        SpanId::from_hex("b7ad6b7169203331").unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    let cx = Context::new().with_remote_span_context(remote);

    telemetry.logs().info_with_context(&cx, "remote only", &[]);
    telemetry.logs().info("no context", &[]);

    for msg in ["remote only", "no context"] {
        let lines = buffer.messages(msg);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].get("trace_id").is_none());
        assert!(lines[0].get("dd.trace_id").is_none());
        assert_eq!(lines[0]["host"], common::HOST_NAME);
    }
}

#[tokio::test]
async fn test_error_entry_has_error_field() {
    let (telemetry, _conn, buffer) = common::started_telemetry().await;

    let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away");
    telemetry.logs().error(&err, "upstream failed", &[]);

    let lines = buffer.messages("upstream failed");
    assert_eq!(lines[0]["level"], "error");
    assert_eq!(lines[0]["error"], "peer went away");
}
