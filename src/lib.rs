//! Observability bootstrap for network services.
//!
//! Resolves the service configuration, then initializes, enriches and shuts
//! down structured logging, metrics and tracing, and exposes them as HTTP
//! middleware.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{ConfigResolver, Resolution, ResolvedConfig};
pub use http::{HttpServer, MiddlewareChain};
pub use lifecycle::Bootstrap;
pub use net::{CollectorConnection, GrpcConnectionOptions};
pub use observability::{ObservabilityError, Telemetry};
