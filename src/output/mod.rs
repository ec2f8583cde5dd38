// src/output/mod.rs

//! Output side of the bridge: fragment sinks, the per-execution aggregator
//! and the foreground capability.
//!
//! - [`aggregator`] accumulates the fragments of exactly one execution.
//! - [`registration`] binds a sink to one automaton or to the process-wide
//!   global slot.
//! - [`foreground`] defines what the display-owning side receives.

use std::sync::Arc;

pub mod aggregator;
pub mod foreground;
pub mod registration;

/// Callback invoked once per text fragment, from the automaton's thread.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

pub use aggregator::OutputAggregator;
pub use foreground::{Delivery, DeliveryStatus, ForegroundSink, StdoutForeground};
pub use registration::{CallbackRegistration, GlobalLease, GlobalOutputSlot};
