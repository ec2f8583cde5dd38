// src/exec/workload.rs

//! The opaque computation behind an automaton, and how to create one.
//!
//! The bridge never looks inside a [`Workload`]: it only hands it an output
//! registration plus a stop token, runs it on a blocking thread and collects
//! the [`RunOutcome`]. Production code plugs in
//! [`PipelineFactory`](super::pipeline::PipelineFactory); tests provide
//! scripted workloads that emit fixed fragments.

use crate::exec::cancel::CancelToken;
use crate::output::CallbackRegistration;

/// How a computation ended, as reported by the computation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran to its natural end.
    Completed,
    /// Halted early because a stop was requested.
    Stopped,
    /// Terminated with a non-zero native status code.
    Failed(i32),
}

/// A blocking background computation that emits text fragments.
///
/// `run` is called exactly once, on a thread where blocking is allowed. It
/// should poll `stop` at convenient points and return
/// [`RunOutcome::Stopped`] once it honours the request.
pub trait Workload: Send + 'static {
    fn run(&mut self, output: &CallbackRegistration, stop: &CancelToken) -> RunOutcome;
}

impl<F> Workload for F
where
    F: FnMut(&CallbackRegistration, &CancelToken) -> RunOutcome + Send + 'static,
{
    fn run(&mut self, output: &CallbackRegistration, stop: &CancelToken) -> RunOutcome {
        self(output, stop)
    }
}

/// Trait abstracting how fresh automaton instances are allocated.
///
/// Every execution (and every poll tick) asks the factory for a new
/// workload; instances are never reused.
pub trait AutomatonFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn Workload>;
}

impl<F> AutomatonFactory for F
where
    F: Fn() -> Box<dyn Workload> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn Workload> {
        self()
    }
}
