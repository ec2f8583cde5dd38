// src/exec/mod.rs

//! Automaton execution layer.
//!
//! This module owns the background computation and its lifecycle:
//!
//! - [`workload`] defines the opaque computation (`Workload`), how it ends
//!   (`RunOutcome`) and how fresh instances are made (`AutomatonFactory`).
//! - [`lifecycle`] is the pure `Created -> Running -> Stopped/Completed ->
//!   Disposed` state machine.
//! - [`handle`] wraps one instance: start on Tokio's blocking pool, advisory
//!   stop, async wait, idempotent dispose, release on drop.
//! - [`cancel`] provides the cooperative `CancelToken`.
//! - [`pipeline`] is the reference automaton used by the CLI: a chain of
//!   worker stations connected by bounded FIFOs.

pub mod cancel;
pub mod handle;
pub mod lifecycle;
pub mod pipeline;
pub mod workload;

pub use cancel::CancelToken;
pub use handle::{AutomatonHandle, Completion};
pub use lifecycle::{Lifecycle, LifecycleOp, LifecycleState};
pub use pipeline::{Pipeline, PipelineFactory};
pub use workload::{AutomatonFactory, RunOutcome, Workload};
