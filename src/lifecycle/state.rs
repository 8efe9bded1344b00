//! Subsystem lifecycle state machine.
//!
//! # States
//! - Uninitialized: no exporter handle, every use fails with `NotInitialized`
//! - Initialized: exactly one live handle, readable without locking
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initialized: install(handle)
//! Initialized → Initialized: install(handle), prior handle released first
//! Initialized → Uninitialized: release(generation, deadline)
//! ```
//!
//! # Design Decisions
//! - Reads go through `ArcSwapOption` so request tasks never block
//! - Transitions are serialized by a mutex; racing installs are last-writer-wins
//! - Every install gets a generation so stale shutdown handles are no-ops
//! - Inside a Tokio runtime a replaced handle is flushed on the blocking pool,
//!   bounded by `REPLACED_TEARDOWN_DEADLINE`; outside one it is flushed inline

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::observability::error::{ObservabilityError, ObservabilityResult, Subsystem};

/// How long a replaced handle may take to flush before a warning is logged.
pub const REPLACED_TEARDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// A subsystem handle that can flush and release its exporter.
pub trait Teardown: Send + Sync + 'static {
    /// Flush pending data and release the exporter. May block.
    fn teardown(&self) -> ObservabilityResult<()>;
}

/// A live handle together with the generation it was installed under.
#[derive(Debug)]
pub struct Installed<T> {
    generation: u64,
    value: T,
}

impl<T> Installed<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> Deref for Installed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Lifecycle of one subsystem handle.
pub struct Lifecycle<T> {
    subsystem: Subsystem,
    slot: ArcSwapOption<Installed<T>>,
    transition: Mutex<()>,
    generations: AtomicU64,
}

impl<T: Teardown> Lifecycle<T> {
    pub fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            slot: ArcSwapOption::empty(),
            transition: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.load().is_some()
    }

    /// The live handle, or the abort error when uninitialized.
    pub fn current(&self) -> ObservabilityResult<Arc<Installed<T>>> {
        self.slot
            .load_full()
            .ok_or(ObservabilityError::NotInitialized(self.subsystem))
    }

    /// Install a new handle, releasing any previous one first.
    ///
    /// The predecessor leaves the slot and its teardown starts before the new
    /// handle is stored. Within a Tokio runtime the flush itself runs on the
    /// blocking pool, so the caller never stalls a worker thread on a slow
    /// collector.
    ///
    /// Returns the generation of the new handle.
    pub fn install(&self, value: T) -> u64 {
        let _guard = self.lock();

        if let Some(previous) = self.slot.swap(None) {
            tracing::debug!(
                subsystem = %self.subsystem,
                generation = previous.generation,
                "Releasing previous exporter before re-initializing"
            );
            self.teardown_replaced(previous);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.slot.store(Some(Arc::new(Installed { generation, value })));
        generation
    }

    fn teardown_replaced(&self, previous: Arc<Installed<T>>) {
        let subsystem = self.subsystem;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            if let Err(e) = previous.teardown() {
                tracing::warn!(subsystem = %subsystem, error = %e, "Previous exporter did not shut down cleanly");
            }
            return;
        };

        let task = runtime.spawn_blocking(move || previous.teardown());
        runtime.spawn(async move {
            match tokio::time::timeout(REPLACED_TEARDOWN_DEADLINE, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    tracing::warn!(subsystem = %subsystem, error = %e, "Previous exporter did not shut down cleanly")
                }
                Ok(Err(e)) => {
                    tracing::warn!(subsystem = %subsystem, error = %e, "Previous exporter teardown panicked")
                }
                Err(_) => tracing::warn!(
                    subsystem = %subsystem,
                    deadline = ?REPLACED_TEARDOWN_DEADLINE,
                    "Previous exporter is still flushing after the deadline"
                ),
            }
        });
    }

    /// Detach the live handle if it matches `generation` (any handle when `None`).
    fn detach(&self, generation: Option<u64>) -> Option<Arc<Installed<T>>> {
        let _guard = self.lock();

        let current = self.slot.load_full()?;
        if generation.is_some_and(|g| g != current.generation) {
            return None;
        }
        self.slot.swap(None)
    }

    /// Release the handle synchronously. Releasing an empty slot is a no-op.
    pub fn release_now(&self, generation: Option<u64>) -> ObservabilityResult<()> {
        match self.detach(generation) {
            Some(installed) => installed.teardown(),
            None => Ok(()),
        }
    }

    /// Release the handle, waiting at most `deadline` for the flush.
    ///
    /// The state is uninitialized as soon as this is called, even when the
    /// flush later times out.
    pub async fn release(&self, generation: Option<u64>, deadline: Duration) -> ObservabilityResult<()> {
        let Some(installed) = self.detach(generation) else {
            return Ok(());
        };

        let subsystem = self.subsystem;
        let task = tokio::task::spawn_blocking(move || installed.teardown());
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ObservabilityError::exporter(subsystem, join_error)),
            Err(_) => Err(ObservabilityError::ShutdownTimeout { subsystem, deadline }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.transition
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
