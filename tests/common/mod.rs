#![allow(dead_code, unused_imports)]

pub use autobridge_test_utils::builders;
pub use autobridge_test_utils::fake_automaton::{
    Gate, RunCounters, ScriptedFactory, ScriptedWorkload,
};
pub use autobridge_test_utils::recording::RecordingForeground;
pub use autobridge_test_utils::{init_tracing, isolated_bridge, wait_until, with_timeout};

use autobridge::engine::BridgeOptions;
use autobridge::types::CallbackScope;

/// Default options with the given scope.
pub fn options(scope: CallbackScope) -> BridgeOptions {
    BridgeOptions {
        scope,
        ..BridgeOptions::default()
    }
}
