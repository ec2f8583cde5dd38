// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::engine::RunId;
use crate::exec::lifecycle::{LifecycleOp, LifecycleState};

#[derive(Error, Debug)]
pub enum BridgeError {
    /// An automaton operation was called in a state that forbids it.
    #[error("Lifecycle violation: cannot {op} an automaton that is {state}")]
    Lifecycle {
        op: LifecycleOp,
        state: LifecycleState,
    },

    /// The global output slot is held by another execution.
    #[error("Global output slot busy: run {holder} is still running")]
    GlobalSlotBusy { holder: RunId },

    /// A poll tick was started while the previous tick was still in flight.
    #[error("Poll tick {tick} rejected: previous tick has not finished")]
    TickOverlap { tick: u64 },

    /// Cancelled while still waiting to start (e.g. queued for the global slot).
    #[error("Execution {run_id} cancelled before it started")]
    Cancelled { run_id: RunId },

    #[error("Automaton worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    pub(crate) fn lifecycle(op: LifecycleOp, state: LifecycleState) -> Self {
        BridgeError::Lifecycle { op, state }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BridgeError>;
