// src/engine/bridge.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::{BridgeError, Result};
use crate::exec::{AutomatonFactory, AutomatonHandle, CancelToken, Completion, RunOutcome};
use crate::output::{
    CallbackRegistration, Delivery, DeliveryStatus, ForegroundSink, GlobalOutputSlot,
    OutputAggregator, OutputSink,
};
use crate::types::{CallbackScope, GlobalContention};

use super::{BridgeOptions, RunId};

/// Stand-in for "no deadline" in `select!` loops.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

type FragmentRx = mpsc::UnboundedReceiver<String>;

/// Runs executions of an automaton and hands their output to a foreground.
///
/// Each call to [`execute`](Self::execute) is one independent execution:
///
/// 1. a fresh `OutputAggregator` (never reused);
/// 2. an output registration according to `options.scope`;
/// 3. a fresh `AutomatonHandle`, started on the blocking pool and awaited
///    while watching for cancellation and the optional timeout;
/// 4. after `wait` returns: dispose, then exactly one `display` call with the
///    snapshot and a status.
///
/// Global-scoped executions hold the global slot from registration until the
/// computation returns, so two of them never run at once: the second is
/// rejected or queued depending on `options.on_global_busy`.
pub struct ExecutionBridge {
    factory: Arc<dyn AutomatonFactory>,
    options: BridgeOptions,
    global_slot: GlobalOutputSlot,
    next_run_id: AtomicU64,
}

impl fmt::Debug for ExecutionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionBridge")
            .field("options", &self.options)
            .field("global_slot", &self.global_slot)
            .finish_non_exhaustive()
    }
}

impl ExecutionBridge {
    /// Bridge using the process-wide global slot.
    pub fn new(factory: impl AutomatonFactory, options: BridgeOptions) -> Self {
        Self {
            factory: Arc::new(factory),
            options,
            global_slot: GlobalOutputSlot::process(),
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Use `slot` instead of the process-wide global slot.
    pub fn with_global_slot(mut self, slot: GlobalOutputSlot) -> Self {
        self.global_slot = slot;
        self
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn global_slot(&self) -> &GlobalOutputSlot {
        &self.global_slot
    }

    /// Run one execution to the end and deliver its output.
    ///
    /// Returns the delivery that was displayed. If the bridge fails after the
    /// execution began, the foreground still receives the partial output with
    /// `DeliveryStatus::Error` and the error is returned. A global-scoped
    /// execution that never got the slot (rejected, or cancelled while
    /// queued) never calls `display`; the foreground gets `rejected` instead.
    pub async fn execute<S>(&self, foreground: &mut S, cancel: &CancelToken) -> Result<Delivery>
    where
        S: ForegroundSink + ?Sized,
    {
        let (result, _detached) = self.execute_tracked(foreground, cancel).await;
        result
    }

    /// Like [`execute`](Self::execute), also returning the completion signal
    /// of a computation that was abandoned and is still running detached.
    pub(crate) async fn execute_tracked<S>(
        &self,
        foreground: &mut S,
        cancel: &CancelToken,
    ) -> (Result<Delivery>, Option<Completion>)
    where
        S: ForegroundSink + ?Sized,
    {
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let aggregator = OutputAggregator::new();

        let (registration, mut fragments) = match self.register(run_id, &aggregator, cancel).await
        {
            Ok(registered) => registered,
            Err(err) => {
                foreground.rejected(&err);
                return (Err(err), None);
            }
        };
        info!(run_id, scope = %self.options.scope, "execution started");

        let mut handle = AutomatonHandle::create(run_id, self.factory.create(), registration);
        let driven = self
            .drive(&mut handle, &aggregator, fragments.as_mut(), foreground, cancel)
            .await;

        // Fragments sent before the computation returned are already queued.
        if let Some(rx) = fragments.as_mut() {
            while let Ok(fragment) = rx.try_recv() {
                aggregator.append(&fragment);
                foreground.progress(&fragment);
            }
        }

        let mut detached = None;
        if handle.state().is_finished() {
            if let Err(err) = handle.dispose() {
                warn!(run_id, error = %err, "failed to dispose automaton");
            }
        } else {
            // Abandoned: dropping the handle detaches the computation.
            detached = handle.completion();
        }
        drop(handle);

        let status = match &driven {
            Ok(status) => status.clone(),
            Err(err) => DeliveryStatus::Error(err.to_string()),
        };
        let delivery = Delivery {
            run_id,
            text: aggregator.snapshot(),
            status,
        };

        foreground.display(&delivery);
        info!(
            run_id,
            status = %delivery.status,
            fragments = aggregator.len(),
            bytes = delivery.text.len(),
            "execution delivered"
        );

        (driven.map(|_| delivery), detached)
    }

    /// Start one execution as its own Tokio task.
    ///
    /// The returned [`ExecutionTask`] carries the cancellation token for that
    /// execution and resolves to the same result as [`execute`](Self::execute).
    pub fn spawn<S>(self: &Arc<Self>, mut foreground: S) -> ExecutionTask
    where
        S: ForegroundSink + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let bridge = Arc::clone(self);

        let join = tokio::spawn(async move { bridge.execute(&mut foreground, &token).await });

        ExecutionTask { cancel, join }
    }

    async fn register(
        &self,
        run_id: RunId,
        aggregator: &OutputAggregator,
        cancel: &CancelToken,
    ) -> Result<(CallbackRegistration, Option<FragmentRx>)> {
        match self.options.scope {
            CallbackScope::Instance => Ok((CallbackRegistration::instance(aggregator.sink()), None)),
            CallbackScope::Channel => {
                let (tx, rx) = mpsc::unbounded_channel::<String>();
                let sink: OutputSink = Arc::new(move |fragment: &str| {
                    // The receiver only goes away once the execution is over.
                    let _ = tx.send(fragment.to_owned());
                });
                Ok((CallbackRegistration::instance(sink), Some(rx)))
            }
            CallbackScope::Global => {
                let sink = aggregator.sink();
                let lease = match self.options.on_global_busy {
                    GlobalContention::Reject => self.global_slot.try_acquire(run_id, sink)?,
                    GlobalContention::Queue => {
                        tokio::select! {
                            lease = self.global_slot.acquire(run_id, sink) => lease,
                            _ = cancel.cancelled() => {
                                info!(run_id, "cancelled while queued for the global output slot");
                                return Err(BridgeError::Cancelled { run_id });
                            }
                        }
                    }
                };
                Ok((CallbackRegistration::Global(lease), None))
            }
        }
    }

    /// Start the handle and wait for it, honouring cancellation and timeout.
    async fn drive<S>(
        &self,
        handle: &mut AutomatonHandle,
        aggregator: &OutputAggregator,
        mut fragments: Option<&mut FragmentRx>,
        foreground: &mut S,
        cancel: &CancelToken,
    ) -> Result<DeliveryStatus>
    where
        S: ForegroundSink + ?Sized,
    {
        handle.start()?;
        let run_id = handle.run_id();

        let deadline = sleep_until(deadline_after(self.options.timeout.unwrap_or(FAR_FUTURE)));
        tokio::pin!(deadline);
        let grace = sleep_until(deadline_after(FAR_FUTURE));
        tokio::pin!(grace);

        // Set once we asked the automaton to stop: Stopped or TimedOut.
        let mut interrupted: Option<DeliveryStatus> = None;

        loop {
            tokio::select! {
                res = handle.wait() => {
                    let outcome = res?;
                    let status = match interrupted {
                        Some(DeliveryStatus::TimedOut) if outcome != RunOutcome::Completed => {
                            DeliveryStatus::TimedOut
                        }
                        _ => DeliveryStatus::from(outcome),
                    };
                    return Ok(status);
                }

                Some(fragment) = next_fragment(&mut fragments) => {
                    aggregator.append(&fragment);
                    foreground.progress(&fragment);
                }

                _ = cancel.cancelled(), if interrupted.is_none() => {
                    info!(run_id, "cancellation requested; stopping automaton");
                    self.request_stop(handle);
                    grace.as_mut().reset(deadline_after(self.options.stop_grace));
                    interrupted = Some(DeliveryStatus::Stopped);
                }

                _ = &mut deadline, if interrupted.is_none() => {
                    warn!(
                        run_id,
                        timeout_ms = self.options.timeout.unwrap_or_default().as_millis() as u64,
                        "execution timed out; stopping automaton"
                    );
                    self.request_stop(handle);
                    grace.as_mut().reset(deadline_after(self.options.stop_grace));
                    interrupted = Some(DeliveryStatus::TimedOut);
                }

                _ = &mut grace, if interrupted.is_some() => {
                    warn!(
                        run_id,
                        grace_ms = self.options.stop_grace.as_millis() as u64,
                        "automaton ignored stop request; abandoning it"
                    );
                    return Ok(DeliveryStatus::Abandoned);
                }
            }
        }
    }

    fn request_stop(&self, handle: &mut AutomatonHandle) {
        if let Err(err) = handle.stop() {
            debug!(run_id = handle.run_id(), error = %err, "stop not applicable");
        }
    }
}

/// `now + after`, saturating at [`FAR_FUTURE`] for durations the clock
/// cannot represent.
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

async fn next_fragment(fragments: &mut Option<&mut FragmentRx>) -> Option<String> {
    match fragments {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// One execution running as a Tokio task, with its own cancellation token.
#[derive(Debug)]
pub struct ExecutionTask {
    cancel: CancelToken,
    join: JoinHandle<Result<Delivery>>,
}

impl ExecutionTask {
    /// Ask the execution to stop. Advisory, like [`AutomatonHandle::stop`]:
    /// the delivery still arrives, with status `Stopped` (or `Abandoned`).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the execution's result.
    pub async fn join(self) -> Result<Delivery> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(BridgeError::Other(
                anyhow::Error::new(err).context("execution task did not complete"),
            )),
        }
    }
}
