// src/cli.rs

//! Command-line surface of the `blockwise` binary.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "blockwise",
    version,
    about = "Run block-decomposed tasks in dependency order across a pool of workers.",
    long_about = None
)]
pub struct CliArgs {
    /// TOML file describing the tasks to run.
    #[arg(long, value_name = "PATH", default_value = "Blockwise.toml")]
    pub config: String,

    /// Number of concurrent workers; overrides `[config].num_workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Log verbosity. Falls back to `BLOCKWISE_LOG`, then `info`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print the task layout without running blocks.
    #[arg(long)]
    pub dry_run: bool,
}

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
