// src/output/registration.rs

//! Where an automaton's text fragments go.
//!
//! Two mutually exclusive registrations exist per execution:
//!
//! - **Instance**: the sink is bound to one automaton handle when it is
//!   created. Concurrent executions each own their sink, so they never see
//!   each other's fragments.
//! - **Global**: fragments go to whatever sink is currently installed in the
//!   process-wide [`GlobalOutputSlot`]. Two executions sharing the slot would
//!   interleave or misattribute output, so the slot is only handed out as a
//!   [`GlobalLease`]: at most one lease exists at a time, and the lease clears
//!   the sink when it is dropped.
//!
//! The lease travels with the computation (it is part of the
//! [`CallbackRegistration`] moved onto the blocking thread), so the slot is
//! released exactly when the computation returns, even if the handle that
//! started it was abandoned.

use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

use crate::engine::RunId;
use crate::errors::{BridgeError, Result};

use super::OutputSink;

static PROCESS_SLOT: LazyLock<GlobalOutputSlot> = LazyLock::new(GlobalOutputSlot::new);

/// Single-sink output slot shared by every global-scoped automaton.
#[derive(Clone)]
pub struct GlobalOutputSlot {
    inner: Arc<SlotInner>,
}

struct SlotInner {
    sink: Mutex<Option<OutputSink>>,
    holder: Mutex<Option<RunId>>,
    exclusive: Arc<tokio::sync::Mutex<()>>,
}

impl GlobalOutputSlot {
    /// A slot private to the caller. Useful for embedding several independent
    /// bridges in one process (and for tests).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                sink: Mutex::new(None),
                holder: Mutex::new(None),
                exclusive: Arc::new(tokio::sync::Mutex::new(())),
            }),
        }
    }

    /// The process-wide slot.
    pub fn process() -> Self {
        PROCESS_SLOT.clone()
    }

    /// Install `sink`, replacing whatever was installed before.
    ///
    /// This bypasses the exclusivity guard. While a lease is held, calling it
    /// redirects that execution's output.
    pub fn install(&self, sink: OutputSink) {
        *lock(&self.inner.sink) = Some(sink);
    }

    pub fn clear(&self) {
        *lock(&self.inner.sink) = None;
    }

    pub fn is_installed(&self) -> bool {
        lock(&self.inner.sink).is_some()
    }

    /// Run currently holding the slot, if any.
    pub fn holder(&self) -> Option<RunId> {
        *lock(&self.inner.holder)
    }

    /// Deliver a fragment to the currently installed sink.
    pub fn emit(&self, fragment: &str) {
        // Clone the sink out so the callback never runs under our lock.
        let sink = lock(&self.inner.sink).clone();
        match sink {
            Some(sink) => sink(fragment),
            None => trace!(len = fragment.len(), "no global sink installed; fragment dropped"),
        }
    }

    /// Take the slot for `run_id` or fail if another run holds it.
    pub fn try_acquire(&self, run_id: RunId, sink: OutputSink) -> Result<GlobalLease> {
        match Arc::clone(&self.inner.exclusive).try_lock_owned() {
            Ok(guard) => Ok(self.lease(run_id, sink, guard)),
            Err(_) => Err(BridgeError::GlobalSlotBusy {
                // 0 when the holder is between locking and recording itself.
                holder: self.holder().unwrap_or(0),
            }),
        }
    }

    /// Take the slot for `run_id`, waiting for the current holder to finish.
    pub async fn acquire(&self, run_id: RunId, sink: OutputSink) -> GlobalLease {
        if let Some(holder) = self.holder() {
            debug!(run_id, holder, "global output slot busy; queueing");
        }
        let guard = Arc::clone(&self.inner.exclusive).lock_owned().await;
        self.lease(run_id, sink, guard)
    }

    fn lease(&self, run_id: RunId, sink: OutputSink, guard: OwnedMutexGuard<()>) -> GlobalLease {
        *lock(&self.inner.holder) = Some(run_id);
        self.install(sink);
        debug!(run_id, "acquired global output slot");
        GlobalLease {
            slot: self.clone(),
            run_id,
            _exclusive: guard,
        }
    }
}

impl Default for GlobalOutputSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlobalOutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalOutputSlot")
            .field("installed", &self.is_installed())
            .field("holder", &self.holder())
            .finish()
    }
}

/// Exclusive right to the global slot for one run.
///
/// Dropping the lease clears the sink and lets the next run in.
pub struct GlobalLease {
    slot: GlobalOutputSlot,
    run_id: RunId,
    _exclusive: OwnedMutexGuard<()>,
}

impl GlobalLease {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn slot(&self) -> &GlobalOutputSlot {
        &self.slot
    }
}

impl Drop for GlobalLease {
    fn drop(&mut self) {
        // Runs before `_exclusive` is released, so the next holder never sees
        // our sink.
        self.slot.clear();
        *lock(&self.slot.inner.holder) = None;
        debug!(run_id = self.run_id, "released global output slot");
    }
}

impl fmt::Debug for GlobalLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalLease")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

/// Output binding handed to a workload for the lifetime of one execution.
pub enum CallbackRegistration {
    /// Emit through the process-wide slot held by this lease.
    Global(GlobalLease),
    /// Emit straight into a sink bound at creation.
    Instance(OutputSink),
}

impl CallbackRegistration {
    pub fn instance(sink: OutputSink) -> Self {
        CallbackRegistration::Instance(sink)
    }

    /// Deliver one fragment.
    pub fn emit(&self, fragment: &str) {
        match self {
            CallbackRegistration::Global(lease) => lease.slot.emit(fragment),
            CallbackRegistration::Instance(sink) => sink(fragment),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, CallbackRegistration::Global(_))
    }
}

impl fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackRegistration::Global(lease) => f.debug_tuple("Global").field(lease).finish(),
            CallbackRegistration::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
