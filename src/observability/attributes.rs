//! Canonical resource attributes derived from the resolved configuration.
//!
//! One [`ResourceAttributes`] value feeds the log standard-fields hook, the
//! meter scope and the tracer resource, so all three agree on every field.

use std::sync::Arc;

use opentelemetry::KeyValue;

use crate::config::ResolvedConfig;

pub const SERVICE_KEY: &str = "service";
pub const VERSION_KEY: &str = "version";
pub const COMMIT_HASH_KEY: &str = "commit_hash";
pub const ENVIRONMENT_KEY: &str = "env";
pub const BUILD_DATE_KEY: &str = "build_date";
pub const HOST_KEY: &str = "host";
pub const CONTAINER_ID_KEY: &str = "container_id";

/// Ordered, immutable key/value set shared across subsystems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAttributes {
    entries: Arc<[(&'static str, String)]>,
}

impl ResourceAttributes {
    /// Derive the attribute set. Pure and deterministic.
    pub fn derive(config: &ResolvedConfig) -> Self {
        let entries: Vec<(&'static str, String)> = vec![
            (SERVICE_KEY, config.service_name().to_string()),
            (VERSION_KEY, config.version().to_string()),
            (COMMIT_HASH_KEY, config.commit_hash().to_string()),
            (ENVIRONMENT_KEY, config.environment().to_string()),
            (BUILD_DATE_KEY, config.build_date().to_string()),
            (HOST_KEY, config.host_name().to_string()),
            (CONTAINER_ID_KEY, config.host_name().to_string()),
        ];
        Self {
            entries: entries.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn service_name(&self) -> &str {
        self.get(SERVICE_KEY).unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.get(VERSION_KEY).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// OpenTelemetry form, used for resources, scopes and span base attributes.
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        self.iter()
            .map(|(k, v)| KeyValue::new(k, v.to_string()))
            .collect()
    }
}
