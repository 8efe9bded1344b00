//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! build constants (name, date, version, commit)
//! CLI flags / environment variables / optional TOML file
//!     → resolver.rs (capture & merge by precedence)
//!     → loader.rs (read the optional file)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ResolvedConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is resolved once per process; there is no reload
//! - A partially valid configuration is never returned
//! - Help and version requests are outcomes, not errors

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use resolver::{ConfigResolver, Flags, RawInputs, Resolution};
pub use schema::{Environment, LogLevel, ResolvedConfig};
pub use validation::ValidationError;

/// Resolve the process configuration for one service build.
///
/// Reads the real command line and environment. Use [`ConfigResolver`] with
/// [`RawInputs::from_parts`] to resolve explicit inputs.
pub fn resolve(
    service_name: &str,
    build_date: &str,
    version: &str,
    commit_hash: &str,
) -> Result<Resolution, ConfigError> {
    ConfigResolver::new(service_name, build_date, version, commit_hash).resolve_process()
}
