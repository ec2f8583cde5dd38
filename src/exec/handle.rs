// src/exec/handle.rs

//! Owning handle for one automaton instance.

use std::any::Any;
use std::fmt;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::RunId;
use crate::errors::{BridgeError, Result};
use crate::exec::cancel::CancelToken;
use crate::exec::lifecycle::{Lifecycle, LifecycleOp, LifecycleState};
use crate::exec::workload::{RunOutcome, Workload};
use crate::output::CallbackRegistration;

/// Exclusive owner of one background computation.
///
/// - `start` moves the workload and its output registration onto Tokio's
///   blocking pool. The registration is dropped as soon as the workload
///   returns, which releases a global lease and closes channel sinks.
/// - `wait` is async and cancel-safe: dropping the future before it resolves
///   leaves the handle `Running`, and it can be awaited again.
/// - Every operation called in the wrong state returns
///   `BridgeError::Lifecycle`; nothing panics.
/// - A second `dispose` is a no-op.
///
/// Dropping a handle that is still `Running` requests a stop and detaches the
/// computation; it keeps running on its blocking thread until it notices.
pub struct AutomatonHandle {
    run_id: RunId,
    created_at: Instant,
    lifecycle: Lifecycle,
    stop: CancelToken,
    global: bool,
    pending: Option<(Box<dyn Workload>, CallbackRegistration)>,
    join: Option<JoinHandle<RunOutcome>>,
    completion: Option<Completion>,
    outcome: Option<RunOutcome>,
}

impl AutomatonHandle {
    /// Allocate a new instance in state `Created`, permanently bound to
    /// `registration`.
    pub fn create(
        run_id: RunId,
        workload: Box<dyn Workload>,
        registration: CallbackRegistration,
    ) -> Self {
        let global = registration.is_global();
        debug!(run_id, global, "automaton created");
        Self {
            run_id,
            created_at: Instant::now(),
            lifecycle: Lifecycle::new(),
            stop: CancelToken::new(),
            global,
            pending: Some((workload, registration)),
            join: None,
            completion: None,
            outcome: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Outcome observed by `wait`, if it has returned.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// `Created -> Running`: begin the computation.
    pub fn start(&mut self) -> Result<()> {
        self.lifecycle.check_start()?;
        let runtime = tokio::runtime::Handle::try_current()
            .context("starting an automaton requires a Tokio runtime")?;

        let (mut workload, registration) = self
            .pending
            .take()
            .ok_or_else(|| BridgeError::lifecycle(LifecycleOp::Start, self.state()))?;
        self.lifecycle.start()?;

        let run_id = self.run_id;
        let stop = self.stop.clone();
        // Dropped without a send if the workload panics, which also closes
        // the channel.
        let (done_tx, done_rx) = watch::channel(false);
        self.completion = Some(Completion { rx: done_rx });
        self.join = Some(runtime.spawn_blocking(move || {
            debug!(run_id, "automaton computation running");
            let outcome = workload.run(&registration, &stop);
            // Release the output binding before reporting completion.
            drop(registration);
            done_tx.send_replace(true);
            debug!(run_id, ?outcome, "automaton computation returned");
            outcome
        }));

        info!(run_id, global = self.global, "automaton started");
        Ok(())
    }

    /// Request early termination. Advisory: the computation decides when to
    /// actually halt, and `wait` reports what it did.
    pub fn stop(&mut self) -> Result<()> {
        self.lifecycle.request_stop()?;
        self.stop.cancel();
        info!(run_id = self.run_id, "stop requested for running automaton");
        Ok(())
    }

    /// Token that stops this automaton, usable while `wait` borrows the
    /// handle. Cancelling it after the computation ended has no effect.
    pub fn stopper(&self) -> CancelToken {
        self.stop.clone()
    }

    /// Signal that resolves when the computation returns. Outlives the handle,
    /// so it can track a computation that was detached. `None` before `start`.
    pub fn completion(&self) -> Option<Completion> {
        self.completion.clone()
    }

    /// Wait for the computation to reach `Stopped` or `Completed`.
    pub async fn wait(&mut self) -> Result<RunOutcome> {
        self.lifecycle.check_wait()?;
        let state = self.state();
        let join = self
            .join
            .as_mut()
            .ok_or_else(|| BridgeError::lifecycle(LifecycleOp::Wait, state))?;

        let joined = join.await;
        self.join = None;

        match joined {
            Ok(outcome) => {
                let state = self.lifecycle.finish(outcome)?;
                self.outcome = Some(outcome);
                info!(
                    run_id = self.run_id,
                    ?outcome,
                    %state,
                    stop_requested = self.stop.is_cancelled(),
                    elapsed_ms = self.created_at.elapsed().as_millis() as u64,
                    "automaton finished"
                );
                Ok(outcome)
            }
            Err(err) => {
                let outcome = RunOutcome::Failed(-1);
                self.lifecycle.finish(outcome)?;
                self.outcome = Some(outcome);

                let msg = if err.is_panic() {
                    panic_message(err.into_panic())
                } else {
                    err.to_string()
                };
                error!(run_id = self.run_id, error = %msg, "automaton computation aborted");
                Err(BridgeError::WorkerPanicked(msg))
            }
        }
    }

    /// Release the instance. Valid after `wait` has returned; repeated calls
    /// are a no-op.
    pub fn dispose(&mut self) -> Result<()> {
        if self.lifecycle.dispose()? {
            debug!(
                run_id = self.run_id,
                lifetime_ms = self.created_at.elapsed().as_millis() as u64,
                "automaton disposed"
            );
        } else {
            debug!(run_id = self.run_id, "automaton already disposed; ignoring");
        }
        Ok(())
    }
}

impl Drop for AutomatonHandle {
    fn drop(&mut self) {
        match self.lifecycle.state() {
            LifecycleState::Running => {
                self.stop.cancel();
                self.lifecycle.abandon();
                warn!(
                    run_id = self.run_id,
                    "automaton dropped while running; stop requested and computation detached"
                );
            }
            LifecycleState::Created => {
                debug!(run_id = self.run_id, "automaton dropped before start");
            }
            LifecycleState::Stopped | LifecycleState::Completed => {
                let _ = self.dispose();
            }
            LifecycleState::Disposed => {}
        }
    }
}

impl fmt::Debug for AutomatonHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomatonHandle")
            .field("run_id", &self.run_id)
            .field("state", &self.lifecycle.state())
            .field("global", &self.global)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Observes the end of one automaton computation.
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<bool>,
}

impl Completion {
    /// Whether the computation has returned (or unwound).
    pub fn is_done(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the computation has returned (or unwound).
    pub async fn done(&self) {
        let mut rx = self.rx.clone();
        // A closed channel means the blocking thread is gone.
        let _ = rx.wait_for(|done| *done).await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
