// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::engine::{BridgeOptions, ExecutionBridge, Poller, PollerOptions};
use crate::exec::{CancelToken, PipelineFactory};
use crate::output::StdoutForeground;
use crate::types::CallbackScope;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the reference pipeline factory
/// - the execution bridge, or a poller around it
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    apply_overrides(&mut cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg, args.polling());
        return Ok(());
    }

    let factory = PipelineFactory::new(*cfg.automaton());
    let bridge = Arc::new(ExecutionBridge::new(
        factory,
        BridgeOptions::from(cfg.bridge()),
    ));

    // Ctrl-C → stop the running execution (and the poller, if any).
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; stopping");
            cancel.cancel();
        });
    }

    let mut foreground =
        StdoutForeground::new().with_progress(cfg.bridge().scope == CallbackScope::Channel);

    if args.polling() {
        let options = PollerOptions {
            interval: cfg.poller().interval,
            ticks: cfg.poller().ticks,
        };
        let poller = Poller::new(bridge, options);
        let summary = poller.run(&mut foreground, &cancel).await?;
        info!(
            ticks = summary.ticks,
            completed = summary.completed,
            failed = summary.failed,
            rejected = summary.rejected,
            "polling finished"
        );
    } else {
        let delivery = bridge.execute(&mut foreground, &cancel).await?;
        if !delivery.status.is_success() {
            warn!(run_id = delivery.run_id, status = %delivery.status, "execution did not complete");
        }
    }

    Ok(())
}

/// CLI flags win over the config file.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(scope) = args.scope {
        cfg.bridge_mut().scope = scope;
    }
    if let Some(ticks) = args.ticks {
        cfg.poller_mut().ticks = Some(ticks);
    }
}

/// Print the effective configuration without running anything.
fn print_dry_run(cfg: &ConfigFile, polling: bool) {
    let bridge = cfg.bridge();
    let poller = cfg.poller();
    let automaton = cfg.automaton();

    println!("autobridge dry-run");
    println!("  mode = {}", if polling { "poll" } else { "once" });
    println!();

    println!("bridge:");
    println!("  scope = {}", bridge.scope);
    println!("  on_global_busy = {}", bridge.on_global_busy);
    match bridge.timeout {
        Some(timeout) => println!("  timeout = {timeout:?}"),
        None => println!("  timeout = none"),
    }
    println!("  stop_grace = {:?}", bridge.stop_grace);

    if polling {
        println!("poller:");
        println!("  interval = {:?}", poller.interval);
        match poller.ticks {
            Some(ticks) => println!("  ticks = {ticks}"),
            None => println!("  ticks = until interrupted"),
        }
    }

    println!("automaton:");
    println!("  codes = {}", automaton.codes);
    println!("  relays = {}", automaton.relays);
    if let Some(fail_at) = automaton.fail_at {
        println!("  fail_at = {fail_at}");
    }
    println!("  emit_delay = {:?}", automaton.emit_delay);

    debug!("dry-run complete (no execution)");
}
