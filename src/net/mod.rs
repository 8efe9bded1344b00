//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Host service
//!     → connection.rs (dial collector or build in-memory collector)
//!     → CollectorConnection shared by MetricsExporter and TraceExporter
//!     → OTLP/gRPC exporters (external)
//! ```

pub mod connection;

pub use connection::{CollectorConnection, GrpcConnectionOptions, InMemoryCollector};
