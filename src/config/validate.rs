// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{
    AutomatonSettings, BridgeSettings, ConfigFile, PollerSettings, RawAutomatonSection,
    RawBridgeSection, RawConfigFile, RawPollerSection,
};
use crate::errors::{BridgeError, Result};

/// Upper bound on pass-through stations; each one is a thread per execution.
pub const MAX_RELAYS: usize = 16;

/// Longest duration any setting accepts: 365 days.
pub const MAX_DURATION: Duration = Duration::from_secs(60 * 60 * 24 * 365);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BridgeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let bridge = validate_bridge(&raw.bridge)?;
        let poller = validate_poller(&raw.poller)?;
        let automaton = validate_automaton(&raw.automaton)?;
        Ok(ConfigFile::new_unchecked(bridge, poller, automaton))
    }
}

fn validate_bridge(raw: &RawBridgeSection) -> Result<BridgeSettings> {
    let timeout = raw
        .timeout
        .as_deref()
        .map(|s| duration_field("bridge", "timeout", s))
        .transpose()?;
    if timeout.is_some_and(|t| t.is_zero()) {
        return Err(BridgeError::ConfigError(
            "[bridge].timeout must be greater than zero; omit it to disable".to_string(),
        ));
    }

    let stop_grace = duration_field("bridge", "stop_grace", &raw.stop_grace)?;
    if stop_grace.is_zero() {
        return Err(BridgeError::ConfigError(
            "[bridge].stop_grace must be greater than zero".to_string(),
        ));
    }

    Ok(BridgeSettings {
        scope: raw.scope,
        on_global_busy: raw.on_global_busy,
        timeout,
        stop_grace,
    })
}

fn validate_poller(raw: &RawPollerSection) -> Result<PollerSettings> {
    let interval = duration_field("poller", "interval", &raw.interval)?;
    if interval.is_zero() {
        return Err(BridgeError::ConfigError(
            "[poller].interval must be greater than zero".to_string(),
        ));
    }

    if raw.ticks == Some(0) {
        return Err(BridgeError::ConfigError(
            "[poller].ticks must be >= 1 (got 0); omit it to poll until interrupted".to_string(),
        ));
    }

    Ok(PollerSettings {
        interval,
        ticks: raw.ticks,
    })
}

fn validate_automaton(raw: &RawAutomatonSection) -> Result<AutomatonSettings> {
    if raw.relays > MAX_RELAYS {
        return Err(BridgeError::ConfigError(format!(
            "[automaton].relays must be <= {MAX_RELAYS} (got {})",
            raw.relays
        )));
    }

    let emit_delay = duration_field("automaton", "emit_delay", &raw.emit_delay)?;

    Ok(AutomatonSettings {
        codes: raw.codes,
        relays: raw.relays,
        fail_at: raw.fail_at,
        emit_delay,
    })
}

fn duration_field(section: &str, key: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value)
        .map_err(|e| BridgeError::ConfigError(format!("[{section}].{key}: {e}")))?;
    if duration > MAX_DURATION {
        return Err(BridgeError::ConfigError(format!(
            "[{section}].{key} must be at most 365 days (got '{}')",
            value.trim()
        )));
    }
    Ok(duration)
}
