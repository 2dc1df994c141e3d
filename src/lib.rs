// src/lib.rs

//! Incremental computation engine with a file-watching build layer.
//!
//! - [`graph`]: cells, memoized computables, lazy and eager propagation.
//! - [`asynchronous`]: future-valued nodes and write-coalescing cells.
//! - [`channel`]: in-process message queue with close semantics.
//! - [`watch`]: debounced, cancellable file watching.
//! - [`build`]: watched inputs and asynchronous build targets.
//! - [`engine`] / [`config`]: the manifest-driven `incrbuild` binary.

pub mod asynchronous;
pub mod build;
pub mod channel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, manifest_root, Manifest};
use crate::engine::{BuildEngine, EngineOptions, Runtime, RuntimeOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - the build graph and its input watchers
/// - the rebuild loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let manifest = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&manifest);
        return Ok(());
    }

    let root = manifest_root(&config_path);
    info!(?root, "loading build graph");
    let engine = BuildEngine::from_manifest(&manifest, EngineOptions::new(root)).await?;

    // Ctrl-C → graceful shutdown.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            shutdown.cancel();
        });
    }

    let options = RuntimeOptions { once: args.once };
    Runtime::new(engine, shutdown, options).run().await?;
    Ok(())
}

/// Simple dry-run output: print targets in build order.
fn print_dry_run(manifest: &Manifest) {
    println!("incrbuild dry-run");
    println!("  config.update_policy = {:?}", manifest.config.update_policy);
    println!("  config.debounce_ms = {}", manifest.config.debounce_ms);
    println!();

    println!("targets ({}):", manifest.target.len());
    for name in manifest.order() {
        let Some(target) = manifest.target.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      output: {}", target.output.display());
        if !target.after.is_empty() {
            println!("      after: {:?}", target.after);
        }
        if !target.inputs.is_empty() {
            println!("      inputs: {:?}", target.inputs);
        }
    }

    debug!("dry-run complete (nothing built)");
}
