//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → middleware/ (trace → log → metrics)
//!     → request.rs (header and user-agent attributes)
//!     → route handlers
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::{HttpMetrics, MiddlewareChain, INBOUND_REQUEST};
pub use request::{parse_headers, parse_user_agent, request_attributes};
pub use server::HttpServer;
