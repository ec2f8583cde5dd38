// src/engine/mod.rs

//! Orchestration engine for the execution-output bridge.
//!
//! - [`bridge`] runs one execution end to end: fresh aggregator, output
//!   registration, handle start/wait/dispose, single delivery to the
//!   foreground.
//! - [`poller`] repeats executions on a fixed interval, one independent
//!   execution per tick, never overlapping.

use std::time::Duration;

use crate::config::BridgeSettings;
use crate::types::{CallbackScope, GlobalContention};

/// Identifier of one execution, unique per bridge. Starts at 1.
pub type RunId = u64;

/// Default time a stopped automaton gets to halt before it is abandoned.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Options shared by every execution of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Where the automaton's fragments go.
    pub scope: CallbackScope,
    /// What a global-scoped execution does when the slot is taken.
    pub on_global_busy: GlobalContention,
    /// Hard limit on one execution; `None` waits forever.
    pub timeout: Option<Duration>,
    /// How long to keep waiting after a stop request (timeout or
    /// cancellation) before abandoning the computation.
    pub stop_grace: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            scope: CallbackScope::default(),
            on_global_busy: GlobalContention::default(),
            timeout: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

impl From<&BridgeSettings> for BridgeOptions {
    fn from(settings: &BridgeSettings) -> Self {
        Self {
            scope: settings.scope,
            on_global_busy: settings.on_global_busy,
            timeout: settings.timeout,
            stop_grace: settings.stop_grace,
        }
    }
}

pub mod bridge;
pub mod poller;

pub use bridge::{ExecutionBridge, ExecutionTask};
pub use poller::{PollSummary, Poller, PollerOptions};
