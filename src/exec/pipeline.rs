// src/exec/pipeline.rs

//! Reference automaton: a chain of worker stations.
//!
//! Each station runs on its own scoped thread and hands codes to the next
//! one through a bounded FIFO of depth [`FIFO_DEPTH`]. The first station
//! generates the stream (it receives no input); the last one usually turns
//! codes into text through the output registration.
//!
//! A worker returning `false` fails the whole pipeline. Stations upstream of
//! it see every further `write` refused, so the generator halts at once;
//! downstream stations drain what is already queued and finish. The run then
//! reports `RunOutcome::Failed(1)`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AutomatonSettings;
use crate::exec::cancel::CancelToken;
use crate::exec::workload::{AutomatonFactory, RunOutcome, Workload};
use crate::output::CallbackRegistration;

/// Capacity of the FIFO between two neighbouring stations.
pub const FIFO_DEPTH: usize = 4;

/// Native status reported when a worker fails.
pub const WORKER_FAILED_STATUS: i32 = 1;

/// `failed_at` value while every station is healthy.
const NO_FAILURE: usize = usize::MAX;

/// Unit of work flowing between stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code(pub u64);

/// One station of the pipeline.
pub trait Worker: Send {
    /// Process one code. `code` is `None` exactly once, for the first
    /// station, which is expected to generate the whole stream.
    ///
    /// Returning `false` fails the pipeline.
    fn work(&mut self, code: Option<Code>, outlet: &mut Outlet<'_>) -> bool;
}

/// What a worker can do with its results.
pub struct Outlet<'a> {
    next: Option<&'a SyncSender<Code>>,
    output: &'a CallbackRegistration,
    stop: &'a CancelToken,
    station: usize,
    failed_at: &'a AtomicUsize,
}

impl Outlet<'_> {
    /// Pass a code to the next station, blocking while its FIFO is full.
    ///
    /// Returns `false` once a stop was requested, a station downstream failed
    /// or the next station is gone; the code is discarded in that case. On the
    /// last station this is a no-op that returns `true`.
    pub fn write(&mut self, code: Code) -> bool {
        if self.stop_requested() {
            return false;
        }
        match self.next {
            Some(tx) => tx.send(code).is_ok(),
            None => true,
        }
    }

    /// Emit a text fragment through the automaton's output registration.
    pub fn emit(&self, text: &str) {
        self.output.emit(text);
    }

    /// A stop was requested, or this station or one after it failed.
    pub fn stop_requested(&self) -> bool {
        let failed_at = self.failed_at.load(Ordering::SeqCst);
        self.stop.is_cancelled() || (failed_at != NO_FAILURE && self.station <= failed_at)
    }
}

/// First station: generates `0..count`, optionally pausing between codes.
#[derive(Debug, Clone)]
pub struct Generator {
    count: u64,
    delay: Duration,
}

impl Generator {
    pub fn new(count: u64, delay: Duration) -> Self {
        Self { count, delay }
    }
}

impl Worker for Generator {
    fn work(&mut self, _code: Option<Code>, outlet: &mut Outlet<'_>) -> bool {
        for n in 0..self.count {
            if !outlet.write(Code(n)) {
                debug!(generated = n, "generator halted early");
                break;
            }
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        true
    }
}

/// Middle station: passes codes through, failing on `fail_at`.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    fail_at: Option<u64>,
}

impl Relay {
    pub fn new(fail_at: Option<u64>) -> Self {
        Self { fail_at }
    }
}

impl Worker for Relay {
    fn work(&mut self, code: Option<Code>, outlet: &mut Outlet<'_>) -> bool {
        let Some(code) = code else {
            return true;
        };
        if self.fail_at == Some(code.0) {
            warn!(code = code.0, "relay rejected code");
            return false;
        }
        // A refused write means we're stopping; that is not a failure.
        outlet.write(code);
        true
    }
}

/// Last station: emits `"{n}\n"` for every code.
#[derive(Debug, Clone, Default)]
pub struct Printer;

impl Worker for Printer {
    fn work(&mut self, code: Option<Code>, outlet: &mut Outlet<'_>) -> bool {
        if let Some(code) = code {
            outlet.emit(&format!("{}\n", code.0));
        }
        true
    }
}

/// A chain of stations. A pipeline runs once; its workers are consumed.
#[derive(Default)]
pub struct Pipeline {
    workers: Vec<Box<dyn Worker>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker: impl Worker + 'static) -> Self {
        self.workers.push(Box::new(worker));
        self
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Workload for Pipeline {
    fn run(&mut self, output: &CallbackRegistration, stop: &CancelToken) -> RunOutcome {
        let workers = std::mem::take(&mut self.workers);
        if workers.is_empty() {
            debug!("empty pipeline; nothing to run");
            return RunOutcome::Completed;
        }

        let failed_at = AtomicUsize::new(NO_FAILURE);
        let stations = workers.len();

        thread::scope(|scope| {
            let mut upstream: Option<Receiver<Code>> = None;

            for (idx, mut worker) in workers.into_iter().enumerate() {
                let (tx, rx) = if idx + 1 < stations {
                    let (tx, rx) = sync_channel::<Code>(FIFO_DEPTH);
                    (Some(tx), Some(rx))
                } else {
                    (None, None)
                };
                let input = upstream.take();
                let failed_at = &failed_at;

                scope.spawn(move || {
                    let mut outlet = Outlet {
                        next: tx.as_ref(),
                        output,
                        stop,
                        station: idx,
                        failed_at,
                    };

                    let ok = match input {
                        None => worker.work(None, &mut outlet),
                        Some(rx) => rx.iter().all(|code| worker.work(Some(code), &mut outlet)),
                    };

                    if !ok {
                        warn!(station = idx, "pipeline worker failed; stopping pipeline");
                        failed_at.fetch_min(idx, Ordering::SeqCst);
                    }
                    // Dropping `tx` and `input` here unblocks both neighbours.
                });

                upstream = rx;
            }
        });

        if failed_at.load(Ordering::SeqCst) != NO_FAILURE {
            RunOutcome::Failed(WORKER_FAILED_STATUS)
        } else if stop.is_cancelled() {
            RunOutcome::Stopped
        } else {
            RunOutcome::Completed
        }
    }
}

/// Builds a fresh `generator -> relay* -> printer` pipeline per execution.
#[derive(Debug, Clone)]
pub struct PipelineFactory {
    settings: AutomatonSettings,
}

impl PipelineFactory {
    pub fn new(settings: AutomatonSettings) -> Self {
        Self { settings }
    }

    pub fn build(&self) -> Pipeline {
        let s = &self.settings;
        let mut pipeline = Pipeline::new().with_worker(Generator::new(s.codes, s.emit_delay));
        for _ in 0..s.relays {
            pipeline = pipeline.with_worker(Relay::new(s.fail_at));
        }
        pipeline.with_worker(Printer)
    }
}

impl AutomatonFactory for PipelineFactory {
    fn create(&self) -> Box<dyn Workload> {
        Box::new(self.build())
    }
}
