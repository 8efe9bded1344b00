//! Configuration schema definitions.
//!
//! This module defines the validated configuration handed to every
//! observability subsystem, the closed enumerations it is built from, and the
//! optional on-disk file layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment environment of the running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Localhost,
    Dev,
    Stage,
    Prod,
    Test,
}

impl Environment {
    /// Every accepted environment, in the order they are listed to users.
    pub const ALL: [Environment; 5] = [
        Environment::Localhost,
        Environment::Dev,
        Environment::Test,
        Environment::Stage,
        Environment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Localhost => "localhost",
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known [`Environment`] or [`LogLevel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl FromStr for Environment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Ordered log severity. Comparisons follow `Debug < Info < Warn < Error < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// The single validated configuration of the process.
///
/// Only produced by [`crate::config::validation::validate`]; every field is
/// guaranteed non-empty. Read-only once built and shared via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub(crate) service_name: String,
    pub(crate) environment: Environment,
    pub(crate) log_level: LogLevel,
    pub(crate) trace_endpoint: String,
    pub(crate) metrics_endpoint: String,
    pub(crate) host_name: String,
    pub(crate) version: String,
    pub(crate) build_date: String,
    pub(crate) commit_hash: String,
}

impl ResolvedConfig {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Collector address for spans (`<server>:<port>`), not otherwise validated.
    pub fn trace_endpoint(&self) -> &str {
        &self.trace_endpoint
    }

    /// Collector address for metrics (`<server>:<port>`), not otherwise validated.
    pub fn metrics_endpoint(&self) -> &str {
        &self.metrics_endpoint
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build_date(&self) -> &str {
        &self.build_date
    }

    pub fn commit_hash(&self) -> &str {
        &self.commit_hash
    }

    /// Text printed by `--version`.
    pub fn version_banner(&self) -> String {
        version_banner(&self.version, &self.build_date, &self.commit_hash)
    }
}

pub(crate) fn version_banner(version: &str, build_date: &str, commit_hash: &str) -> String {
    format!(
        "Version: {}, Build Date: {}, Build Commit: {}",
        version, build_date, commit_hash
    )
}

/// Root of the optional TOML configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FileConfig {
    /// Lowest-precedence values for the dynamic observability fields.
    pub observability: ObservabilityFileConfig,
}

/// `[observability]` table of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityFileConfig {
    pub environment: Option<String>,
    pub log_level: Option<String>,
    pub trace_endpoint: Option<String>,
    pub metrics_endpoint: Option<String>,
}

#[cfg(test)]
pub(crate) fn test_config() -> ResolvedConfig {
    ResolvedConfig {
        service_name: "unit-tests".to_string(),
        environment: Environment::Test,
        log_level: LogLevel::Debug,
        trace_endpoint: "localhost:4317".to_string(),
        metrics_endpoint: "localhost:4317".to_string(),
        host_name: "test-host".to_string(),
        version: "0.0.0".to_string(),
        build_date: "2023-01-01T00:00:00.000".to_string(),
        commit_hash: "abcd0123".to_string(),
    }
}
