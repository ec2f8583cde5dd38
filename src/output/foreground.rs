// src/output/foreground.rs

//! The display-owning side of the bridge.

use std::fmt;
use std::io::Write;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RunId;
use crate::errors::BridgeError;
use crate::exec::workload::RunOutcome;

/// How an execution ended, from the foreground's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The computation ran to its end.
    Completed,
    /// The computation honoured a stop request.
    Stopped,
    /// The computation reported a non-zero native status code.
    Failed { code: i32 },
    /// The execution hit its timeout and was stopped.
    TimedOut,
    /// The computation did not halt within the stop grace period and was
    /// left running detached.
    Abandoned,
    /// The bridge itself failed.
    Error(String),
}

impl DeliveryStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryStatus::Completed)
    }
}

impl From<RunOutcome> for DeliveryStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => DeliveryStatus::Completed,
            RunOutcome::Stopped => DeliveryStatus::Stopped,
            RunOutcome::Failed(code) => DeliveryStatus::Failed { code },
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Completed => f.write_str("completed"),
            DeliveryStatus::Stopped => f.write_str("stopped"),
            DeliveryStatus::Failed { code } => write!(f, "failed with status {code}"),
            DeliveryStatus::TimedOut => f.write_str("timed out"),
            DeliveryStatus::Abandoned => f.write_str("abandoned after stop grace period"),
            DeliveryStatus::Error(msg) => write!(f, "bridge error: {msg}"),
        }
    }
}

/// Final text of one execution, handed to the foreground exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub run_id: RunId,
    pub text: String,
    pub status: DeliveryStatus,
}

impl Delivery {
    /// Text suitable for replacing the display contents.
    ///
    /// Anything other than a clean completion gets an explicit indicator line
    /// so partial output is never mistaken for the full result.
    pub fn render(&self) -> String {
        if self.status.is_success() {
            return self.text.clone();
        }

        let mut out = self.text.clone();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("[run {} {}]", self.run_id, self.status));
        out
    }
}

/// Capability set the bridge needs from the foreground.
pub trait ForegroundSink: Send {
    /// Replace the displayed text. Called at most once per execution.
    fn display(&mut self, delivery: &Delivery);

    /// Incremental fragment, streamed while the execution is still running.
    /// Only channel-scoped executions produce these.
    fn progress(&mut self, _fragment: &str) {}

    /// A request was turned away before any execution began (busy global
    /// slot, overlapping poll tick, cancelled while queued). `display` is not
    /// called for it, so whatever is on screen is from an earlier execution.
    fn rejected(&mut self, _reason: &BridgeError) {}
}

impl<S: ForegroundSink + ?Sized> ForegroundSink for &mut S {
    fn display(&mut self, delivery: &Delivery) {
        (**self).display(delivery)
    }

    fn progress(&mut self, fragment: &str) {
        (**self).progress(fragment)
    }

    fn rejected(&mut self, reason: &BridgeError) {
        (**self).rejected(reason)
    }
}

/// Forward deliveries to an event loop that owns the real display.
impl ForegroundSink for mpsc::UnboundedSender<Delivery> {
    fn display(&mut self, delivery: &Delivery) {
        if self.send(delivery.clone()).is_err() {
            warn!(run_id = delivery.run_id, "foreground receiver dropped; delivery lost");
        }
    }
}

/// Writes each delivery to stdout as one block per run.
///
/// Logs go to stderr, so stdout carries only automaton output.
#[derive(Debug, Default)]
pub struct StdoutForeground {
    stream_progress: bool,
}

impl StdoutForeground {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print fragments as they arrive.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.stream_progress = enabled;
        self
    }
}

impl ForegroundSink for StdoutForeground {
    fn display(&mut self, delivery: &Delivery) {
        let mut stdout = std::io::stdout().lock();
        if self.stream_progress {
            // Fragments are already on screen; only the indicator is new.
            if !delivery.status.is_success() {
                let _ = writeln!(stdout, "[run {} {}]", delivery.run_id, delivery.status);
            }
        } else {
            let _ = writeln!(stdout, "{}", delivery.render().trim_end_matches('\n'));
        }
        let _ = stdout.flush();
        debug!(run_id = delivery.run_id, status = %delivery.status, "delivery displayed");
    }

    fn rejected(&mut self, reason: &BridgeError) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "[rejected: {reason}]");
        let _ = stdout.flush();
    }

    fn progress(&mut self, fragment: &str) {
        if self.stream_progress {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "{fragment}");
            let _ = stdout.flush();
        }
    }
}
