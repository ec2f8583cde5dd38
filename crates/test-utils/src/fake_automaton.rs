use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use autobridge::exec::{AutomatonFactory, CancelToken, RunOutcome, Workload};
use autobridge::output::CallbackRegistration;

const POLL_STEP: Duration = Duration::from_millis(2);

/// Manually opened barrier a scripted workload blocks on after emitting.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    open: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Counters shared by every clone of a scripted workload.
#[derive(Debug, Default)]
pub struct RunCounters {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl RunCounters {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Started but not yet returned.
    pub fn running(&self) -> usize {
        self.started().saturating_sub(self.finished())
    }
}

/// A fake automaton that:
/// - emits a fixed list of fragments, optionally pausing between them
/// - optionally blocks on a [`Gate`] afterwards
/// - honours stop requests unless told otherwise
/// - ends with a configured outcome, or panics
#[derive(Debug, Clone)]
pub struct ScriptedWorkload {
    fragments: Vec<String>,
    delay: Duration,
    gate: Option<Gate>,
    honour_stop: bool,
    outcome: RunOutcome,
    panic_with: Option<String>,
    counters: Arc<RunCounters>,
}

impl ScriptedWorkload {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            gate: None,
            honour_stop: true,
            outcome: RunOutcome::Completed,
            panic_with: None,
            counters: Arc::new(RunCounters::default()),
        }
    }

    /// Pause before each fragment after the first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block on `gate` after the last fragment.
    pub fn hold_until(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    /// Keep going even when a stop is requested.
    pub fn ignoring_stop(mut self) -> Self {
        self.honour_stop = false;
        self
    }

    pub fn finishing_with(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn panicking(mut self, msg: &str) -> Self {
        self.panic_with = Some(msg.to_string());
        self
    }

    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    fn stopping(&self, stop: &CancelToken) -> bool {
        self.honour_stop && stop.is_cancelled()
    }

    fn execute(&self, output: &CallbackRegistration, stop: &CancelToken) -> RunOutcome {
        for (idx, fragment) in self.fragments.iter().enumerate() {
            if idx > 0 && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if self.stopping(stop) {
                return RunOutcome::Stopped;
            }
            output.emit(fragment);
        }

        if let Some(gate) = &self.gate {
            while !gate.is_open() {
                if self.stopping(stop) {
                    return RunOutcome::Stopped;
                }
                thread::sleep(POLL_STEP);
            }
        }

        if let Some(msg) = &self.panic_with {
            panic!("{msg}");
        }
        self.outcome
    }
}

impl Workload for ScriptedWorkload {
    fn run(&mut self, output: &CallbackRegistration, stop: &CancelToken) -> RunOutcome {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        // Count the run as finished even if the script panics.
        let _finish = FinishGuard(&self.counters);
        self.execute(output, stop)
    }
}

struct FinishGuard<'a>(&'a RunCounters);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out clones of one script; clones share the [`RunCounters`].
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    script: ScriptedWorkload,
    created: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(script: ScriptedWorkload) -> Self {
        Self {
            script,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counters(&self) -> Arc<RunCounters> {
        self.script.counters()
    }

    /// Number of instances handed out so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl AutomatonFactory for ScriptedFactory {
    fn create(&self) -> Box<dyn Workload> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(self.script.clone())
    }
}
