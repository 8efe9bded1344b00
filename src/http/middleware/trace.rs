//! Server span per inbound request.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::trace::SpanKind;
use opentelemetry::KeyValue;
use thiserror::Error;

use crate::http::middleware::INBOUND_REQUEST;
use crate::observability::tracing::extract_context;
use crate::observability::Telemetry;

/// Recorded on spans whose response was a server error.
#[derive(Debug, Error)]
#[error("request failed with status {0}")]
pub struct ServerErrorStatus(pub StatusCode);

/// Start the `inbound-request` span, expose it to inner layers through the
/// request extensions and end it according to the response status.
pub async fn trace_request(
    State(telemetry): State<Telemetry>,
    mut request: Request,
    next: Next,
) -> Response {
    let parent = extract_context(request.headers());
    let attributes = [
        KeyValue::new("http.method", request.method().to_string()),
        KeyValue::new("http.path", request.uri().path().to_string()),
    ];

    let span = match telemetry
        .traces()
        .start(Some(&parent), INBOUND_REQUEST, SpanKind::Server, &attributes)
    {
        Ok(span) => span,
        Err(e) => {
            tracing::error!(error = %e, path = %request.uri().path(), "Request served without a span");
            return next.run(request).await;
        }
    };

    request.extensions_mut().insert(span.clone());
    let response = next.run(request).await;

    let status = response.status();
    span.set_attribute(KeyValue::new("http.status_code", i64::from(status.as_u16())));
    if status.is_server_error() {
        span.end_error(&ServerErrorStatus(status));
    } else {
        span.end_ok();
    }
    response
}
