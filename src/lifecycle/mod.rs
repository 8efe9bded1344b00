//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Logging → Dial collector → Tracing → Metrics → Listeners
//!
//! Subsystem state (state.rs):
//!     uninitialized → initialized → uninitialized
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Drain HTTP → Flush metrics/traces within a deadline → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then exporters, then listeners
//! - Re-initializing a subsystem tears down its previous exporter first
//! - Shutdown has a deadline and is safe to repeat

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::ShutdownHandle;
pub use startup::Bootstrap;
pub use state::{Lifecycle, Teardown};
