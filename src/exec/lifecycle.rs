// src/exec/lifecycle.rs

//! Pure lifecycle state machine for one automaton instance.
//!
//! This type has no Tokio types and performs no IO: it only decides whether
//! an operation is allowed in the current state and which state comes next.
//! [`AutomatonHandle`](super::handle::AutomatonHandle) consults it before
//! touching the actual computation, so every lifecycle violation is reported
//! the same way (`BridgeError::Lifecycle`).
//!
//! ```text
//! Created --start--> Running --wait--> Completed --dispose--> Disposed
//!                         |
//!                         +----wait----> Stopped ----dispose--> Disposed
//! ```

use std::fmt;

use crate::errors::{BridgeError, Result};
use crate::exec::workload::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
    Completed,
    Disposed,
}

impl LifecycleState {
    /// The computation has terminated (either way) and `wait` has observed it.
    pub fn is_finished(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Completed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Created => "created",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Completed => "completed",
            LifecycleState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Operations that are subject to lifecycle checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Stop,
    Wait,
    Dispose,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleOp::Start => "start",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Wait => "wait for",
            LifecycleOp::Dispose => "dispose",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    stop_requested: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Created,
            stop_requested: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Check that `start` may be called.
    pub fn check_start(&self) -> Result<()> {
        self.require(LifecycleOp::Start, LifecycleState::Created)
    }

    /// `Created -> Running`.
    pub fn start(&mut self) -> Result<()> {
        self.check_start()?;
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Record a stop request. The state stays `Running` until `wait` observes
    /// the computation actually halting.
    pub fn request_stop(&mut self) -> Result<()> {
        self.require(LifecycleOp::Stop, LifecycleState::Running)?;
        self.stop_requested = true;
        Ok(())
    }

    /// Check that `wait` may be called.
    pub fn check_wait(&self) -> Result<()> {
        self.require(LifecycleOp::Wait, LifecycleState::Running)
    }

    /// `Running -> Stopped | Completed`, depending on how the computation
    /// ended. Failures count as completion: the computation ran to its end.
    pub fn finish(&mut self, outcome: RunOutcome) -> Result<LifecycleState> {
        self.check_wait()?;
        self.state = match outcome {
            RunOutcome::Stopped => LifecycleState::Stopped,
            RunOutcome::Completed | RunOutcome::Failed(_) => LifecycleState::Completed,
        };
        Ok(self.state)
    }

    /// `Stopped | Completed -> Disposed`.
    ///
    /// Returns `Ok(false)` if the instance was already disposed: a repeated
    /// dispose is a no-op, not an error.
    pub fn dispose(&mut self) -> Result<bool> {
        match self.state {
            LifecycleState::Disposed => Ok(false),
            s if s.is_finished() => {
                self.state = LifecycleState::Disposed;
                Ok(true)
            }
            s => Err(BridgeError::lifecycle(LifecycleOp::Dispose, s)),
        }
    }

    /// Mark the instance as gone without the usual checks (used when a
    /// running handle is dropped and its computation is detached).
    pub fn abandon(&mut self) {
        self.state = LifecycleState::Disposed;
    }

    fn require(&self, op: LifecycleOp, required: LifecycleState) -> Result<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(BridgeError::lifecycle(op, self.state))
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
