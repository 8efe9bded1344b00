//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging, tracing and metrics in dependency order
//! - Dial the collector endpoints (once when they are the same address)
//! - Release whatever was started if a later step fails
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned to the host
//! - Subsystems initialize in order, not concurrently
//! - Logging first so the remaining steps are visible

use std::time::Duration;

use crate::net::connection::{CollectorConnection, GrpcConnectionOptions};
use crate::observability::{LogOutput, ObservabilityError, ObservabilityResult, Telemetry};

/// How long a failed startup waits for already-started subsystems to flush.
const ROLLBACK_DEADLINE: Duration = Duration::from_secs(5);

/// Brings a [`Telemetry`] handle from uninitialized to fully running.
pub struct Bootstrap<'a> {
    telemetry: &'a Telemetry,
    namespace: String,
    output: LogOutput,
    connection: Option<CollectorConnection>,
    wait_for_connect: Option<Duration>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(telemetry: &'a Telemetry, namespace: impl Into<String>) -> Self {
        Self {
            telemetry,
            namespace: namespace.into(),
            output: LogOutput::Stdout,
            connection: None,
            wait_for_connect: None,
        }
    }

    pub fn log_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Use `connection` for both tracing and metrics instead of dialing the
    /// configured endpoints.
    pub fn connection(mut self, connection: CollectorConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Block on connecting to each collector for at most `timeout`.
    pub fn wait_for_connect(mut self, timeout: Duration) -> Self {
        self.wait_for_connect = Some(timeout);
        self
    }

    pub async fn start(self) -> ObservabilityResult<()> {
        let Bootstrap {
            telemetry,
            namespace,
            output,
            connection,
            wait_for_connect,
        } = self;

        telemetry.init_logging(output);

        let result = async {
            let (trace_conn, metrics_conn) = match connection {
                Some(conn) => (conn.clone(), conn),
                None => dial_endpoints(telemetry, wait_for_connect).await?,
            };

            telemetry.traces().initialize(Some(&trace_conn))?;
            telemetry.metrics().initialize(&namespace, Some(&metrics_conn))?;
            Ok::<(), ObservabilityError>(())
        }
        .await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Telemetry startup failed");
            if let Err(rollback) = telemetry.shutdown_all(ROLLBACK_DEADLINE).await {
                tracing::warn!(error = %rollback, "Rollback after failed startup was incomplete");
            }
            return result;
        }

        tracing::info!(
            service = %telemetry.config().service_name(),
            environment = %telemetry.config().environment(),
            "Telemetry started"
        );
        result
    }
}

async fn dial_endpoints(
    telemetry: &Telemetry,
    wait_for_connect: Option<Duration>,
) -> ObservabilityResult<(CollectorConnection, CollectorConnection)> {
    let options = |endpoint: &str| {
        let opts = GrpcConnectionOptions::new(endpoint);
        match wait_for_connect {
            Some(timeout) => opts.wait_for_connect(timeout),
            None => opts,
        }
    };

    let config = telemetry.config();
    let trace_conn = CollectorConnection::dial(options(config.trace_endpoint())).await?;
    if config.metrics_endpoint() == config.trace_endpoint() {
        return Ok((trace_conn.clone(), trace_conn));
    }
    let metrics_conn = CollectorConnection::dial(options(config.metrics_endpoint())).await?;
    Ok((trace_conn, metrics_conn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::test_config;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_with_in_memory_collector() {
        let telemetry = Telemetry::new(Arc::new(test_config()));

        Bootstrap::new(&telemetry, "acme")
            .log_output(LogOutput::writer(std::io::sink()))
            .connection(CollectorConnection::in_memory())
            .start()
            .await
            .unwrap();

        assert!(telemetry.logs().is_initialized());
        assert!(telemetry.traces().is_initialized());
        assert!(telemetry.metrics().is_initialized());

        telemetry.shutdown_all(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back() {
        let telemetry = Telemetry::new(Arc::new(test_config()));

        let err = Bootstrap::new(&telemetry, "")
            .log_output(LogOutput::writer(std::io::sink()))
            .connection(CollectorConnection::in_memory())
            .start()
            .await
            .unwrap_err();

        assert!(matches!(err, ObservabilityError::EmptyNamespace));
        assert!(!telemetry.logs().is_initialized());
        assert!(!telemetry.traces().is_initialized());
        assert!(!telemetry.metrics().is_initialized());
    }
}
