// src/config/loader.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BridgeError, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; durations and bounds are checked
/// by [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    debug!(path = %path.as_ref().display(), "configuration loaded");
    Ok(config)
}

/// Resolve the configuration for a run.
///
/// - An explicit `path` must exist.
/// - Without one, [`default_config_path`] is used if present; a missing
///   default file yields the built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        return load_and_validate(path);
    }

    let default_path = default_config_path();
    match load_and_validate(&default_path) {
        Err(BridgeError::IoError(err)) if err.kind() == io::ErrorKind::NotFound => {
            info!(
                path = %default_path.display(),
                "no config file found; using built-in defaults"
            );
            Ok(ConfigFile::default())
        }
        other => other,
    }
}

/// `Autobridge.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Autobridge.toml")
}
