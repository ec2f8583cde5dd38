// tests/pipeline.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{RecordingForeground, init_tracing, isolated_bridge, options, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use autobridge::config::AutomatonSettings;
use autobridge::exec::pipeline::{Code, Generator, Outlet, Printer, Relay, Worker};
use autobridge::exec::{CancelToken, Pipeline, PipelineFactory, RunOutcome, Workload};
use autobridge::output::{CallbackRegistration, DeliveryStatus, OutputAggregator};
use autobridge::types::CallbackScope;

type TestResult = Result<(), Box<dyn Error>>;

fn expected_lines(n: u64) -> String {
    (0..n).map(|i| format!("{i}\n")).collect()
}

fn run_pipeline(mut pipeline: Pipeline, stop: &CancelToken) -> (RunOutcome, String) {
    let aggregator = OutputAggregator::new();
    let registration = CallbackRegistration::instance(aggregator.sink());
    let outcome = pipeline.run(&registration, stop);
    (outcome, aggregator.snapshot())
}

#[test]
fn default_pipeline_prints_codes_in_order() {
    let factory = PipelineFactory::new(AutomatonSettings::default());
    let pipeline = factory.build();
    assert_eq!(pipeline.len(), 4, "generator, two relays, printer");

    let (outcome, text) = run_pipeline(pipeline, &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(text, expected_lines(10));
}

#[test]
fn more_codes_than_fifo_depth_still_arrive_in_order() {
    let settings = AutomatonSettings {
        codes: 100,
        relays: 5,
        ..AutomatonSettings::default()
    };
    let (outcome, text) = run_pipeline(PipelineFactory::new(settings).build(), &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(text, expected_lines(100));
}

#[test]
fn relay_failure_fails_the_pipeline_with_partial_output() {
    let settings = AutomatonSettings {
        codes: 10,
        relays: 2,
        fail_at: Some(3),
        ..AutomatonSettings::default()
    };
    let (outcome, text) = run_pipeline(PipelineFactory::new(settings).build(), &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Failed(1));
    assert_eq!(text, expected_lines(3));
}

#[test]
fn generator_and_printer_alone_form_a_pipeline() {
    let settings = AutomatonSettings {
        codes: 3,
        relays: 0,
        ..AutomatonSettings::default()
    };
    let (outcome, text) = run_pipeline(PipelineFactory::new(settings).build(), &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(text, "0\n1\n2\n");
}

#[test]
fn empty_pipeline_completes_without_output() {
    let (outcome, text) = run_pipeline(Pipeline::new(), &CancelToken::new());
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(text.is_empty());
}

#[test]
fn stopped_pipeline_reports_stopped() {
    let stop = CancelToken::new();
    stop.cancel();

    let pipeline = Pipeline::new()
        .with_worker(Generator::new(1_000, Duration::ZERO))
        .with_worker(Relay::new(None))
        .with_worker(Printer);
    let (outcome, text) = run_pipeline(pipeline, &stop);

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(text.is_empty());
}

/// Doubles every code it sees.
struct Doubler;

impl Worker for Doubler {
    fn work(&mut self, code: Option<Code>, outlet: &mut Outlet<'_>) -> bool {
        match code {
            Some(Code(n)) => outlet.write(Code(n * 2)) || outlet.stop_requested(),
            None => true,
        }
    }
}

#[test]
fn custom_workers_can_be_chained() {
    let pipeline = Pipeline::new()
        .with_worker(Generator::new(4, Duration::ZERO))
        .with_worker(Doubler)
        .with_worker(Printer);
    let (outcome, text) = run_pipeline(pipeline, &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(text, "0\n2\n4\n6\n");
}

/// Generates up to `limit` codes, counting the writes that were accepted.
struct CountingSource {
    limit: u64,
    accepted: Arc<AtomicU64>,
}

impl Worker for CountingSource {
    fn work(&mut self, _code: Option<Code>, outlet: &mut Outlet<'_>) -> bool {
        for n in 0..self.limit {
            if !outlet.write(Code(n)) {
                break;
            }
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
        true
    }
}

/// Fails on the first code it receives.
struct Refuser;

impl Worker for Refuser {
    fn work(&mut self, code: Option<Code>, _outlet: &mut Outlet<'_>) -> bool {
        code.is_none()
    }
}

#[test]
fn downstream_failure_halts_upstream_stations() {
    let accepted = Arc::new(AtomicU64::new(0));
    let pipeline = Pipeline::new()
        .with_worker(CountingSource {
            limit: 100_000,
            accepted: Arc::clone(&accepted),
        })
        .with_worker(Relay::new(None))
        .with_worker(Refuser)
        .with_worker(Printer);

    let (outcome, text) = run_pipeline(pipeline, &CancelToken::new());

    assert_eq!(outcome, RunOutcome::Failed(1));
    assert!(text.is_empty());
    // Only what fit in the FIFOs before the failure was seen.
    let accepted = accepted.load(Ordering::SeqCst);
    assert!(accepted < 100, "generator kept producing: {accepted} codes");
}

#[tokio::test]
async fn bridge_delivers_pipeline_output_from_config() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new().with_codes(5).with_relays(1).build();
    let bridge = isolated_bridge(
        PipelineFactory::new(*cfg.automaton()),
        options(CallbackScope::Channel),
    );
    let mut fg = RecordingForeground::new();

    let delivery = with_timeout(bridge.execute(&mut fg, &CancelToken::new())).await?;

    assert_eq!(delivery.status, DeliveryStatus::Completed);
    assert_eq!(delivery.text, expected_lines(5));
    assert_eq!(fg.progress().concat(), expected_lines(5));
    Ok(())
}

#[tokio::test]
async fn bridge_surfaces_pipeline_failure_status() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new().with_fail_at(5).build();
    let bridge = isolated_bridge(
        PipelineFactory::new(*cfg.automaton()),
        options(CallbackScope::Instance),
    );
    let mut fg = RecordingForeground::new();

    let delivery = with_timeout(bridge.execute(&mut fg, &CancelToken::new())).await?;

    assert_eq!(delivery.status, DeliveryStatus::Failed { code: 1 });
    assert_eq!(delivery.text, expected_lines(5));
    Ok(())
}
