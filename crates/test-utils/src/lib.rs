pub mod builders;
pub mod fake_automaton;
pub mod recording;

use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use autobridge::engine::{BridgeOptions, ExecutionBridge};
use autobridge::exec::AutomatonFactory;
use autobridge::output::GlobalOutputSlot;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `cond` every few milliseconds until it holds.
///
/// Wrap in [`with_timeout`] to bound it.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    while !cond() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Bridge with its own global slot, so tests never contend on the
/// process-wide one.
pub fn isolated_bridge(
    factory: impl AutomatonFactory,
    options: BridgeOptions,
) -> Arc<ExecutionBridge> {
    Arc::new(ExecutionBridge::new(factory, options).with_global_slot(GlobalOutputSlot::new()))
}
