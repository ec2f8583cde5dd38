// tests/lifecycle.rs

mod common;
use crate::common::{Gate, ScriptedWorkload, init_tracing, wait_until, with_timeout};

use std::error::Error;
use std::sync::Arc;

use autobridge::errors::BridgeError;
use autobridge::exec::{
    AutomatonHandle, Lifecycle, LifecycleOp, LifecycleState, RunOutcome,
};
use autobridge::output::{CallbackRegistration, OutputAggregator};

type TestResult = Result<(), Box<dyn Error>>;

fn handle_for(script: ScriptedWorkload, aggregator: &OutputAggregator) -> AutomatonHandle {
    AutomatonHandle::create(
        1,
        Box::new(script),
        CallbackRegistration::instance(aggregator.sink()),
    )
}

fn assert_lifecycle_error<T: std::fmt::Debug>(
    result: autobridge::errors::Result<T>,
    expected_op: LifecycleOp,
    expected_state: LifecycleState,
) {
    match result {
        Err(BridgeError::Lifecycle { op, state }) => {
            assert_eq!(op, expected_op);
            assert_eq!(state, expected_state);
        }
        other => panic!("Expected Lifecycle error, got: {:?}", other),
    }
}

#[test]
fn state_machine_follows_the_happy_path() -> TestResult {
    let mut lc = Lifecycle::new();
    assert_eq!(lc.state(), LifecycleState::Created);

    lc.start()?;
    assert_eq!(lc.state(), LifecycleState::Running);

    assert_eq!(lc.finish(RunOutcome::Completed)?, LifecycleState::Completed);
    assert!(lc.dispose()?);
    assert_eq!(lc.state(), LifecycleState::Disposed);
    Ok(())
}

#[test]
fn stop_then_stopped_outcome_ends_in_stopped() -> TestResult {
    let mut lc = Lifecycle::new();
    lc.start()?;
    lc.request_stop()?;
    assert!(lc.stop_requested());
    assert_eq!(lc.state(), LifecycleState::Running);

    assert_eq!(lc.finish(RunOutcome::Stopped)?, LifecycleState::Stopped);
    Ok(())
}

#[test]
fn stop_ignored_by_computation_still_completes() -> TestResult {
    let mut lc = Lifecycle::new();
    lc.start()?;
    lc.request_stop()?;
    assert_eq!(lc.finish(RunOutcome::Completed)?, LifecycleState::Completed);
    Ok(())
}

#[test]
fn native_failure_counts_as_completion() -> TestResult {
    let mut lc = Lifecycle::new();
    lc.start()?;
    assert_eq!(lc.finish(RunOutcome::Failed(3))?, LifecycleState::Completed);
    Ok(())
}

#[test]
fn out_of_order_operations_are_rejected() -> TestResult {
    let mut lc = Lifecycle::new();
    assert_lifecycle_error(lc.request_stop(), LifecycleOp::Stop, LifecycleState::Created);
    assert_lifecycle_error(lc.check_wait(), LifecycleOp::Wait, LifecycleState::Created);
    assert_lifecycle_error(lc.dispose(), LifecycleOp::Dispose, LifecycleState::Created);

    lc.start()?;
    assert_lifecycle_error(lc.start(), LifecycleOp::Start, LifecycleState::Running);
    assert_lifecycle_error(lc.dispose(), LifecycleOp::Dispose, LifecycleState::Running);

    lc.finish(RunOutcome::Completed)?;
    assert_lifecycle_error(lc.request_stop(), LifecycleOp::Stop, LifecycleState::Completed);
    assert_lifecycle_error(lc.start(), LifecycleOp::Start, LifecycleState::Completed);

    lc.dispose()?;
    assert_lifecycle_error(lc.start(), LifecycleOp::Start, LifecycleState::Disposed);
    assert_lifecycle_error(lc.check_wait(), LifecycleOp::Wait, LifecycleState::Disposed);
    Ok(())
}

#[test]
fn second_dispose_is_a_no_op() -> TestResult {
    let mut lc = Lifecycle::new();
    lc.start()?;
    lc.finish(RunOutcome::Stopped)?;

    assert!(lc.dispose()?);
    assert!(!lc.dispose()?);
    assert_eq!(lc.state(), LifecycleState::Disposed);
    Ok(())
}

#[test]
fn lifecycle_error_message_names_operation_and_state() {
    let err = BridgeError::Lifecycle {
        op: LifecycleOp::Wait,
        state: LifecycleState::Created,
    };
    assert_eq!(
        err.to_string(),
        "Lifecycle violation: cannot wait for an automaton that is created"
    );
}

#[tokio::test]
async fn handle_runs_start_wait_dispose() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let mut handle = handle_for(ScriptedWorkload::new(["1", "2", "3"]), &aggregator);
    assert_eq!(handle.state(), LifecycleState::Created);

    handle.start()?;
    assert_eq!(handle.state(), LifecycleState::Running);

    let outcome = with_timeout(handle.wait()).await?;
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(handle.state(), LifecycleState::Completed);
    assert_eq!(handle.outcome(), Some(RunOutcome::Completed));
    assert_eq!(aggregator.snapshot(), "123");

    handle.dispose()?;
    handle.dispose()?;
    assert_eq!(handle.state(), LifecycleState::Disposed);
    Ok(())
}

#[tokio::test]
async fn handle_rejects_misuse_without_panicking() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let gate = Gate::new();
    let mut handle = handle_for(ScriptedWorkload::new(["x"]).hold_until(&gate), &aggregator);

    assert_lifecycle_error(handle.stop(), LifecycleOp::Stop, LifecycleState::Created);
    assert_lifecycle_error(handle.wait().await, LifecycleOp::Wait, LifecycleState::Created);
    assert_lifecycle_error(handle.dispose(), LifecycleOp::Dispose, LifecycleState::Created);

    handle.start()?;
    assert_lifecycle_error(handle.start(), LifecycleOp::Start, LifecycleState::Running);
    assert_lifecycle_error(handle.dispose(), LifecycleOp::Dispose, LifecycleState::Running);

    gate.open();
    with_timeout(handle.wait()).await?;
    assert_lifecycle_error(handle.wait().await, LifecycleOp::Wait, LifecycleState::Completed);
    assert_lifecycle_error(handle.stop(), LifecycleOp::Stop, LifecycleState::Completed);
    Ok(())
}

#[tokio::test]
async fn stop_is_advisory_and_wait_reports_stopped() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let gate = Gate::new();
    let script = ScriptedWorkload::new(["partial"]).hold_until(&gate);
    let mut handle = handle_for(script, &aggregator);

    handle.start()?;
    with_timeout(wait_until(|| aggregator.len() == 1)).await;
    handle.stop()?;

    let outcome = with_timeout(handle.wait()).await?;
    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert_eq!(aggregator.snapshot(), "partial");
    Ok(())
}

#[tokio::test]
async fn dropped_wait_future_leaves_handle_waitable() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let gate = Gate::new();
    let mut handle = handle_for(ScriptedWorkload::new(["z"]).hold_until(&gate), &aggregator);
    handle.start()?;

    let early = tokio::time::timeout(std::time::Duration::from_millis(20), handle.wait()).await;
    assert!(early.is_err(), "wait should still be pending");
    assert_eq!(handle.state(), LifecycleState::Running);

    gate.open();
    assert_eq!(with_timeout(handle.wait()).await?, RunOutcome::Completed);
    Ok(())
}

#[tokio::test]
async fn dropping_a_running_handle_requests_stop() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let gate = Gate::new();
    let script = ScriptedWorkload::new(["a"]).hold_until(&gate);
    let counters = script.counters();
    let mut handle = handle_for(script, &aggregator);

    handle.start()?;
    with_timeout(wait_until(|| counters.started() == 1)).await;
    drop(handle);

    // The detached computation sees the stop request and returns.
    with_timeout(wait_until(|| counters.finished() == 1)).await;
    assert!(!gate.is_open());
    Ok(())
}

#[tokio::test]
async fn completion_outlives_a_dropped_handle() -> TestResult {
    init_tracing();

    let aggregator = OutputAggregator::new();
    let gate = Gate::new();
    let script = ScriptedWorkload::new(["a"]).hold_until(&gate).ignoring_stop();
    let mut handle = handle_for(script, &aggregator);
    assert!(handle.completion().is_none());

    handle.start()?;
    let completion = handle.completion().expect("started handle has a completion");
    drop(handle);
    assert!(!completion.is_done(), "computation still holds the gate");

    gate.open();
    with_timeout(completion.done()).await;
    assert!(completion.is_done());
    assert_eq!(aggregator.snapshot(), "a");
    Ok(())
}

#[test]
fn start_outside_a_runtime_fails_and_keeps_handle_created() {
    let aggregator = OutputAggregator::new();
    let mut handle = handle_for(ScriptedWorkload::new(["never"]), &aggregator);

    let result = handle.start();
    assert!(matches!(result, Err(BridgeError::Other(_))), "got {:?}", result);
    assert_eq!(handle.state(), LifecycleState::Created);
    assert!(aggregator.is_empty());
}

#[tokio::test]
async fn global_flag_reflects_registration() -> TestResult {
    let aggregator = OutputAggregator::new();
    let handle = handle_for(ScriptedWorkload::new(["1"]), &aggregator);
    assert!(!handle.is_global());

    let slot = autobridge::output::GlobalOutputSlot::new();
    let lease = slot.try_acquire(2, Arc::new(|_: &str| {}))?;
    let global = AutomatonHandle::create(
        2,
        Box::new(ScriptedWorkload::new(["1"])),
        CallbackRegistration::Global(lease),
    );
    assert!(global.is_global());
    Ok(())
}
