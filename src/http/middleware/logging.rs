//! Request log entry.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::middleware::INBOUND_REQUEST;
use crate::http::request::request_attributes;
use crate::observability::{ActiveSpan, Telemetry};

/// Log `inbound-request` at info, correlated with the request span when present.
pub async fn log_request(State(telemetry): State<Telemetry>, request: Request, next: Next) -> Response {
    let attrs = request_attributes(&request);

    match request.extensions().get::<ActiveSpan>() {
        Some(span) => telemetry
            .logs()
            .info_with_context(span.context(), INBOUND_REQUEST, &attrs),
        None => telemetry.logs().info(INBOUND_REQUEST, &attrs),
    }

    next.run(request).await
}
