//! Configuration validation.
//!
//! # Responsibilities
//! - Check the build identity handed in by the host (name, date, version, commit)
//! - Check the merged dynamic fields (environment, log level, endpoints)
//! - Turn a [`ConfigCandidate`] into a [`ResolvedConfig`]
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ConfigCandidate → Result<ResolvedConfig, Vec<ValidationError>>
//! - Endpoint format is not checked; dialing the collector reports bad addresses

use thiserror::Error;

use crate::config::schema::{Environment, LogLevel, ResolvedConfig};

/// A single semantic problem with the merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A build-time identity field was empty.
    #[error("arg {0} cannot be empty")]
    MissingBuildField(&'static str),

    /// A required runtime field was empty in every source.
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid environment: {0}; accepted values are `localhost`, `dev`, `test`, `stage`, and `prod`")]
    InvalidEnvironment(String),

    #[error("invalid log level: {0}; accepted levels are `debug`, `info`, `warn`, `error`, and `fatal`")]
    InvalidLogLevel(String),
}

/// Unvalidated values gathered from build constants, flags, environment and file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigCandidate {
    pub service_name: String,
    pub build_date: String,
    pub version: String,
    pub commit_hash: String,
    pub host_name: String,
    pub environment: Option<String>,
    pub log_level: Option<String>,
    pub trace_endpoint: Option<String>,
    pub metrics_endpoint: Option<String>,
}

/// Validate a candidate, reporting every failure in a fixed order:
/// build identity, environment, log level, trace endpoint, metrics endpoint.
pub fn validate(candidate: &ConfigCandidate) -> Result<ResolvedConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let build_fields = [
        ("svcName", &candidate.service_name),
        ("buildDate", &candidate.build_date),
        ("ver", &candidate.version),
        ("commit", &candidate.commit_hash),
    ];
    for (name, value) in build_fields {
        if value.is_empty() {
            errors.push(ValidationError::MissingBuildField(name));
        }
    }

    let environment = match non_empty(&candidate.environment) {
        None => {
            errors.push(ValidationError::Missing("environment"));
            None
        }
        Some(raw) => match raw.parse::<Environment>() {
            Ok(env) => Some(env),
            Err(_) => {
                errors.push(ValidationError::InvalidEnvironment(raw.to_string()));
                None
            }
        },
    };

    let log_level = match non_empty(&candidate.log_level) {
        None => {
            errors.push(ValidationError::Missing("log level"));
            None
        }
        Some(raw) => match raw.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(_) => {
                errors.push(ValidationError::InvalidLogLevel(raw.to_string()));
                None
            }
        },
    };

    let trace_endpoint = non_empty(&candidate.trace_endpoint);
    if trace_endpoint.is_none() {
        errors.push(ValidationError::Missing("trace endpoint"));
    }

    let metrics_endpoint = non_empty(&candidate.metrics_endpoint);
    if metrics_endpoint.is_none() {
        errors.push(ValidationError::Missing("metrics endpoint"));
    }

    match (environment, log_level, trace_endpoint, metrics_endpoint) {
        (Some(environment), Some(log_level), Some(trace), Some(metrics)) if errors.is_empty() => {
            Ok(ResolvedConfig {
                service_name: candidate.service_name.clone(),
                environment,
                log_level,
                trace_endpoint: trace.to_string(),
                metrics_endpoint: metrics.to_string(),
                host_name: candidate.host_name.clone(),
                version: candidate.version.clone(),
                build_date: candidate.build_date.clone(),
                commit_hash: candidate.commit_hash.clone(),
            })
        }
        _ => Err(errors),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
