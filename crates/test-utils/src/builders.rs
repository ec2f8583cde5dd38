#![allow(dead_code)]

use autobridge::config::{ConfigFile, RawConfigFile};
use autobridge::errors::Result;
use autobridge::types::{CallbackScope, GlobalContention};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Goes through the same validation as a file on disk.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_scope(mut self, scope: CallbackScope) -> Self {
        self.config.bridge.scope = scope;
        self
    }

    pub fn with_on_global_busy(mut self, contention: GlobalContention) -> Self {
        self.config.bridge.on_global_busy = contention;
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.bridge.timeout = Some(timeout.to_string());
        self
    }

    pub fn with_stop_grace(mut self, grace: &str) -> Self {
        self.config.bridge.stop_grace = grace.to_string();
        self
    }

    pub fn with_interval(mut self, interval: &str) -> Self {
        self.config.poller.interval = interval.to_string();
        self
    }

    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.config.poller.ticks = Some(ticks);
        self
    }

    pub fn with_codes(mut self, codes: u64) -> Self {
        self.config.automaton.codes = codes;
        self
    }

    pub fn with_relays(mut self, relays: usize) -> Self {
        self.config.automaton.relays = relays;
        self
    }

    pub fn with_fail_at(mut self, code: u64) -> Self {
        self.config.automaton.fail_at = Some(code);
        self
    }

    pub fn with_emit_delay(mut self, delay: &str) -> Self {
        self.config.automaton.emit_delay = delay.to_string();
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
