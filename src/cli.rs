// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `incrbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "incrbuild",
    version,
    about = "Keep build outputs up to date as their input files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build manifest (TOML).
    ///
    /// Default: `Incr.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Incr.toml")]
    pub config: String,

    /// Build every target once, then exit without watching.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INCR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the targets, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
