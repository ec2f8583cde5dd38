// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::CallbackScope;

/// Command-line arguments for `autobridge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "autobridge",
    version,
    about = "Run a background automaton and deliver its aggregated output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Autobridge.toml` in the current working directory, or the
    /// built-in defaults if that file does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run repeatedly on the `[poller]` interval instead of once.
    #[arg(long)]
    pub poll: bool,

    /// Number of poll ticks; overrides `[poller].ticks`. Implies `--poll`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub ticks: Option<u64>,

    /// Output registration scope (global, instance, channel); overrides
    /// `[bridge].scope`.
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<CallbackScope>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AUTOBRIDGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn polling(&self) -> bool {
        self.poll || self.ticks.is_some()
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
