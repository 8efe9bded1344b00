//! Reference service wired through the observability bootstrap.
//!
//! # Startup
//!
//! ```text
//!   flags / env / file ──▶ ConfigResolver ──▶ ResolvedConfig
//!                                                  │
//!                                                  ▼
//!                                             Telemetry
//!                                   ┌──────────────┼──────────────┐
//!                                   ▼              ▼              ▼
//!                               LogSink     TraceExporter  MetricsExporter
//!                                   │              │              │
//!                                   │              └──── OTLP ────┘
//!                                   ▼                     │
//!                                 stdout             collector
//!
//!   HttpServer ──▶ MiddlewareChain (trace → log → metrics) ──▶ handlers
//! ```
//!
//! On SIGINT/SIGTERM the server drains, then metrics, tracing and logging are
//! shut down in that order within [`SHUTDOWN_DEADLINE`].

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use service_observability::config::LogLevel;
use service_observability::observability::SinkLayer;
use service_observability::{Bootstrap, ConfigResolver, HttpServer, Telemetry};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};
const GIT_COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

const BIND_ADDRESS: &str = "0.0.0.0:8080";
const METRICS_NAMESPACE: &str = "svc";
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigResolver::new(SERVICE_NAME, BUILD_DATE, VERSION, GIT_COMMIT).resolve_or_exit();
    let telemetry = Telemetry::new(Arc::new(config));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(telemetry.config().log_level()).into()),
        )
        .with(SinkLayer::new(telemetry.logs().clone()))
        .init();

    if let Err(e) = Bootstrap::new(&telemetry, METRICS_NAMESPACE).start().await {
        if e.is_abort() {
            telemetry.logs().fatal(&e, "Telemetry is unusable", &[]);
        }
        return Err(e.into());
    }

    let served = serve(&telemetry).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }
    telemetry.shutdown_all(SHUTDOWN_DEADLINE).await?;
    served
}

async fn serve(telemetry: &Telemetry) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(BIND_ADDRESS).await?;
    HttpServer::new(telemetry)?.run(listener).await?;
    Ok(())
}

fn default_filter(level: LogLevel) -> String {
    let directive = match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error | LogLevel::Fatal => "error",
    };
    format!("service_observability={directive},tower_http={directive}")
}
