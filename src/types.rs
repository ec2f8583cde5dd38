use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How the automaton's output callback is registered for one execution.
///
/// - `Global`: the process-wide output slot. Only one global-scoped execution
///   may run at a time; see [`GlobalContention`] for what happens to the
///   second one.
/// - `Instance`: a sink bound to the handle at creation, appending straight
///   into the execution's aggregator.
/// - `Channel`: a sink that forwards fragments over a channel owned by the
///   execution; the bridge drains it on the foreground task and can stream
///   each fragment as incremental progress (default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackScope {
    Global,
    Instance,
    Channel,
}

impl Default for CallbackScope {
    fn default() -> Self {
        CallbackScope::Channel
    }
}

impl FromStr for CallbackScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(CallbackScope::Global),
            "instance" => Ok(CallbackScope::Instance),
            "channel" => Ok(CallbackScope::Channel),
            other => Err(format!(
                "invalid scope: {other} (expected \"global\", \"instance\" or \"channel\")"
            )),
        }
    }
}

impl fmt::Display for CallbackScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallbackScope::Global => "global",
            CallbackScope::Instance => "instance",
            CallbackScope::Channel => "channel",
        };
        f.write_str(s)
    }
}

/// Behaviour when a global-scoped execution is requested while another one
/// still holds the global output slot.
///
/// - `Reject`: fail immediately with `BridgeError::GlobalSlotBusy` (default).
/// - `Queue`: wait until the running execution releases the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalContention {
    Reject,
    Queue,
}

impl Default for GlobalContention {
    fn default() -> Self {
        GlobalContention::Reject
    }
}

impl FromStr for GlobalContention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(GlobalContention::Reject),
            "queue" => Ok(GlobalContention::Queue),
            other => Err(format!(
                "invalid on_global_busy: {other} (expected \"reject\" or \"queue\")"
            )),
        }
    }
}

impl fmt::Display for GlobalContention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GlobalContention::Reject => "reject",
            GlobalContention::Queue => "queue",
        };
        f.write_str(s)
    }
}
