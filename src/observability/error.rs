//! Error definitions shared by the logging, metrics and tracing subsystems.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The three subsystems guarded by the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Logging,
    Metrics,
    Tracing,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Logging => f.write_str("logger"),
            Subsystem::Metrics => f.write_str("metrics"),
            Subsystem::Tracing => f.write_str("tracer"),
        }
    }
}

/// Errors that can occur while initializing, using or shutting down a subsystem.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// No collector connection was supplied to `initialize`.
    #[error("failed to create the {0} exporter: the grpc connection is missing")]
    MissingConnection(Subsystem),

    /// The metrics namespace was empty.
    #[error("failed to create the metrics exporter: the namespace is empty")]
    EmptyNamespace,

    /// A subsystem was used before `initialize` or after shutdown.
    ///
    /// This is a programming error in the host service; see [`ObservabilityError::is_abort`].
    #[error("{0} must be initialized before use")]
    NotInitialized(Subsystem),

    /// The underlying exporter or provider reported a failure.
    #[error("{subsystem} exporter error: {source}")]
    Exporter {
        subsystem: Subsystem,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Flushing did not complete before the caller's deadline.
    #[error("{subsystem} shutdown did not finish within {deadline:?}")]
    ShutdownTimeout { subsystem: Subsystem, deadline: Duration },

    /// Dialing the collector failed.
    #[error("failed to connect to collector `{target}`: {source}")]
    Dial {
        target: String,
        source: tonic::transport::Error,
    },

    /// A blocking dial did not connect in time.
    #[error("timed out after {timeout:?} connecting to collector `{target}`")]
    DialTimeout { target: String, timeout: Duration },
}

impl ObservabilityError {
    pub(crate) fn exporter(
        subsystem: Subsystem,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Exporter {
            subsystem,
            source: source.into(),
        }
    }

    /// True for misuse errors the host should turn into a process exit.
    pub fn is_abort(&self) -> bool {
        matches!(self, ObservabilityError::NotInitialized(_))
    }
}

/// Result type for observability operations.
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;
