//! Shutdown handles returned by subsystem initialization.

use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::state::{Lifecycle, Teardown};
use crate::observability::error::{ObservabilityResult, Subsystem};

/// Releases one installed generation of a subsystem.
///
/// Handles are cheap to clone. Shutting down is idempotent, and a handle from
/// an earlier `initialize` call never tears down a newer install.
pub struct ShutdownHandle<T> {
    lifecycle: Arc<Lifecycle<T>>,
    generation: u64,
}

impl<T> Clone for ShutdownHandle<T> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: self.lifecycle.clone(),
            generation: self.generation,
        }
    }
}

impl<T> std::fmt::Debug for ShutdownHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T: Teardown> ShutdownHandle<T> {
    pub(crate) fn new(lifecycle: Arc<Lifecycle<T>>, generation: u64) -> Self {
        Self { lifecycle, generation }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.lifecycle.subsystem()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Flush pending telemetry and release the exporter within `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> ObservabilityResult<()> {
        let result = self.lifecycle.release(Some(self.generation), deadline).await;
        match &result {
            Ok(()) => tracing::debug!(subsystem = %self.subsystem(), generation = self.generation, "Subsystem shut down"),
            Err(e) => tracing::warn!(subsystem = %self.subsystem(), error = %e, "Subsystem shutdown failed"),
        }
        result
    }
}
