// src/engine/poller.rs

//! Timer-driven repeated executions.
//!
//! Every tick is a complete, independent execution (own aggregator, own
//! handle) whose delivery replaces the displayed text. Ticks never overlap:
//! a tick that starts while another is still in flight is rejected with
//! `BridgeError::TickOverlap` before it creates anything. A tick whose
//! computation was abandoned stays in flight until that computation returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::errors::{BridgeError, Result};
use crate::exec::CancelToken;
use crate::output::{Delivery, ForegroundSink};

use super::bridge::ExecutionBridge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    /// Time between the starts of two ticks.
    pub interval: Duration,
    /// Stop after this many ticks; `None` polls until cancelled.
    pub ticks: Option<u64>,
}

/// Counters for one call to [`Poller::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Ticks attempted, including rejected ones.
    pub ticks: u64,
    /// Ticks whose delivery reported a clean completion.
    pub completed: u64,
    /// Ticks that delivered a non-success status or failed in the bridge.
    pub failed: u64,
    /// Ticks rejected before starting (overlap or busy global slot).
    pub rejected: u64,
    /// Timer ticks skipped because a tick overran the interval.
    pub skipped: u64,
}

pub struct Poller {
    bridge: Arc<ExecutionBridge>,
    options: PollerOptions,
    in_flight: Arc<AtomicBool>,
    tick_counter: AtomicU64,
}

impl Poller {
    pub fn new(bridge: Arc<ExecutionBridge>, options: PollerOptions) -> Self {
        Self {
            bridge,
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
            tick_counter: AtomicU64::new(0),
        }
    }

    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    pub fn options(&self) -> &PollerOptions {
        &self.options
    }

    /// Whether a tick is currently in flight, or its abandoned computation is
    /// still running.
    pub fn is_ticking(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a single tick now.
    pub async fn tick<S>(&self, foreground: &mut S, cancel: &CancelToken) -> Result<Delivery>
    where
        S: ForegroundSink + ?Sized,
    {
        let tick = self.tick_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(guard) = TickGuard::try_enter(&self.in_flight) else {
            let err = BridgeError::TickOverlap { tick };
            foreground.rejected(&err);
            return Err(err);
        };

        debug!(tick, "poll tick started");
        let (result, detached) = self.bridge.execute_tracked(foreground, cancel).await;
        debug!(tick, ok = result.is_ok(), "poll tick finished");

        if let Some(completion) = detached {
            warn!(tick, "tick abandoned its computation; holding ticks until it returns");
            tokio::spawn(async move {
                completion.done().await;
                debug!(tick, "abandoned computation returned; ticks resume");
                drop(guard);
            });
        }
        result
    }

    /// Tick on the configured interval until `ticks` is reached or `cancel`
    /// fires.
    ///
    /// The sequence is restartable: calling `run` again after it returned
    /// starts a fresh schedule.
    pub async fn run<S>(&self, foreground: &mut S, cancel: &CancelToken) -> Result<PollSummary>
    where
        S: ForegroundSink + ?Sized,
    {
        if self.options.interval.is_zero() {
            return Err(BridgeError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let mut interval = tokio::time::interval(self.options.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = PollSummary::default();

        info!(
            interval_ms = self.options.interval.as_millis() as u64,
            ticks = ?self.options.ticks,
            "poller started"
        );

        loop {
            if self.options.ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.cancelled() => break,
            }

            let started = Instant::now();
            summary.ticks += 1;

            match self.tick(foreground, cancel).await {
                Ok(delivery) if delivery.status.is_success() => summary.completed += 1,
                Ok(delivery) => {
                    warn!(run_id = delivery.run_id, status = %delivery.status, "poll tick did not complete cleanly");
                    summary.failed += 1;
                }
                Err(err @ (BridgeError::TickOverlap { .. } | BridgeError::GlobalSlotBusy { .. })) => {
                    warn!(error = %err, "poll tick rejected");
                    summary.rejected += 1;
                }
                Err(err) => {
                    error!(error = %err, "poll tick failed");
                    summary.failed += 1;
                }
            }

            let elapsed = started.elapsed();
            if elapsed > self.options.interval {
                let missed = (elapsed.as_nanos() / self.options.interval.as_nanos()) as u64;
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    missed, "poll tick overran the interval; skipping missed ticks"
                );
                summary.skipped += missed;
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        info!(?summary, "poller finished");
        Ok(summary)
    }
}

/// Holds the poller's in-flight flag for the duration of one tick.
struct TickGuard {
    flag: Arc<AtomicBool>,
}

impl TickGuard {
    fn try_enter(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
