//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use service_observability::config::{ConfigResolver, RawInputs, Resolution, ResolvedConfig};
use service_observability::observability::LogOutput;
use service_observability::{Bootstrap, CollectorConnection, Telemetry};

pub const SERVICE_NAME: &str = "orders";
pub const HOST_NAME: &str = "it-host";

/// Log output that tests can read back.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Every JSON line written so far.
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Lines whose `msg` is `msg`.
    pub fn messages(&self, msg: &str) -> Vec<serde_json::Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["msg"] == msg)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Resolve `args` (without program name) and `env` for the test service.
pub fn resolve(args: &[&str], env: &[(&str, &str)]) -> ResolvedConfig {
    let argv = std::iter::once(SERVICE_NAME).chain(args.iter().copied());
    let inputs = RawInputs::from_parts(argv, env.iter().copied())
        .unwrap()
        .with_host_name(HOST_NAME);

    match ConfigResolver::new(SERVICE_NAME, "2024-05-01", "2.3.4", "c0ffee")
        .resolve(&inputs)
        .unwrap()
    {
        Resolution::Ready(config) => config,
        other => panic!("expected ready config, got {:?}", other),
    }
}

/// A debug-level configuration for the `test` environment.
pub fn test_config() -> ResolvedConfig {
    resolve(
        &[],
        &[
            ("ENVIRONMENT", "test"),
            ("LOG_LEVEL", "debug"),
            ("TRACE_ENDPOINT", "collector:4317"),
            ("METRICS_ENDPOINT", "collector:4317"),
        ],
    )
}

/// Fully started telemetry exporting to an in-memory collector.
pub async fn started_telemetry() -> (Telemetry, CollectorConnection, SharedBuffer) {
    let telemetry = Telemetry::new(Arc::new(test_config()));
    let conn = CollectorConnection::in_memory();
    let buffer = SharedBuffer::default();

    Bootstrap::new(&telemetry, "acme")
        .log_output(LogOutput::writer(buffer.clone()))
        .connection(conn.clone())
        .start()
        .await
        .unwrap();

    (telemetry, conn, buffer)
}
