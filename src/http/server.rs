//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the service's own routes
//! - Wrap every route in the instrumentation middleware chain
//! - Bind to a listener and stop on SIGINT/SIGTERM

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::http::middleware::MiddlewareChain;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::{ActiveSpan, ObservabilityResult, Telemetry};

/// Upper bound for a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP server exposing the service routes.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the router. Fails if any telemetry subsystem is uninitialized.
    pub fn new(telemetry: &Telemetry) -> ObservabilityResult<Self> {
        let chain = MiddlewareChain::full(telemetry)?;
        Ok(Self {
            router: Self::build_router(telemetry.clone(), &chain),
        })
    }

    #[allow(deprecated)]
    fn build_router(telemetry: Telemetry, chain: &MiddlewareChain) -> Router {
        let routes = Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .with_state(telemetry);

        chain
            .apply(routes)
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Service identity, logged with the request span.
async fn index_handler(State(telemetry): State<Telemetry>, request: Request) -> impl IntoResponse {
    if let Some(span) = request.extensions().get::<ActiveSpan>() {
        telemetry
            .logs()
            .debug_with_context(span.context(), "serving index", &[]);
    }

    let config = telemetry.config();
    Json(json!({
        "service": config.service_name(),
        "version": config.version(),
        "environment": config.environment().as_str(),
    }))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
