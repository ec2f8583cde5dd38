// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::DEFAULT_STOP_GRACE;
use crate::types::{CallbackScope, GlobalContention};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [bridge]
/// scope = "channel"
/// on_global_busy = "reject"
/// timeout = "30s"
/// stop_grace = "2s"
///
/// [poller]
/// interval = "1s"
/// ticks = 3
///
/// [automaton]
/// codes = 10
/// relays = 2
/// fail_at = 1000
/// emit_delay = "0ms"
/// ```
///
/// All sections are optional. Durations stay strings here; they are parsed
/// during validation (see `ConfigFile::try_from`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub bridge: RawBridgeSection,

    #[serde(default)]
    pub poller: RawPollerSection,

    #[serde(default)]
    pub automaton: RawAutomatonSection,
}

/// `[bridge]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBridgeSection {
    #[serde(default)]
    pub scope: CallbackScope,

    #[serde(default)]
    pub on_global_busy: GlobalContention,

    /// Hard limit per execution, e.g. `"30s"`. No limit when omitted.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default = "default_stop_grace")]
    pub stop_grace: String,
}

fn default_stop_grace() -> String {
    format!("{}ms", DEFAULT_STOP_GRACE.as_millis())
}

impl Default for RawBridgeSection {
    fn default() -> Self {
        Self {
            scope: CallbackScope::default(),
            on_global_busy: GlobalContention::default(),
            timeout: None,
            stop_grace: default_stop_grace(),
        }
    }
}

/// `[poller]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPollerSection {
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Stop after this many ticks; polls until interrupted when omitted.
    #[serde(default)]
    pub ticks: Option<u64>,
}

fn default_interval() -> String {
    "1s".to_string()
}

impl Default for RawPollerSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            ticks: None,
        }
    }
}

/// `[automaton]` section: shape of the reference pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAutomatonSection {
    #[serde(default = "default_codes")]
    pub codes: u64,

    #[serde(default = "default_relays")]
    pub relays: usize,

    #[serde(default)]
    pub fail_at: Option<u64>,

    #[serde(default = "default_emit_delay")]
    pub emit_delay: String,
}

fn default_codes() -> u64 {
    10
}

fn default_relays() -> usize {
    2
}

fn default_emit_delay() -> String {
    "0ms".to_string()
}

impl Default for RawAutomatonSection {
    fn default() -> Self {
        Self {
            codes: default_codes(),
            relays: default_relays(),
            fail_at: None,
            emit_delay: default_emit_delay(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    bridge: BridgeSettings,
    poller: PollerSettings,
    automaton: AutomatonSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    pub scope: CallbackScope,
    pub on_global_busy: GlobalContention,
    pub timeout: Option<Duration>,
    pub stop_grace: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            scope: CallbackScope::default(),
            on_global_busy: GlobalContention::default(),
            timeout: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub ticks: Option<u64>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomatonSettings {
    /// Codes produced by the generator station: `0..codes`.
    pub codes: u64,
    /// Pass-through stations between generator and printer.
    pub relays: usize,
    /// Code value that makes every relay fail.
    pub fail_at: Option<u64>,
    /// Pause after each generated code.
    pub emit_delay: Duration,
}

impl Default for AutomatonSettings {
    fn default() -> Self {
        Self {
            codes: default_codes(),
            relays: default_relays(),
            fail_at: None,
            emit_delay: Duration::ZERO,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            BridgeSettings::default(),
            PollerSettings::default(),
            AutomatonSettings::default(),
        )
    }
}

impl ConfigFile {
    /// Build without running validation. Prefer `ConfigFile::try_from`.
    pub fn new_unchecked(
        bridge: BridgeSettings,
        poller: PollerSettings,
        automaton: AutomatonSettings,
    ) -> Self {
        Self {
            bridge,
            poller,
            automaton,
        }
    }

    pub fn bridge(&self) -> &BridgeSettings {
        &self.bridge
    }

    pub fn poller(&self) -> &PollerSettings {
        &self.poller
    }

    pub fn automaton(&self) -> &AutomatonSettings {
        &self.automaton
    }

    pub fn bridge_mut(&mut self) -> &mut BridgeSettings {
        &mut self.bridge
    }

    pub fn poller_mut(&mut self) -> &mut PollerSettings {
        &mut self.poller
    }
}
