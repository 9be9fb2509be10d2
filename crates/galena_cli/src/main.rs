//! Galena CLI: simulate and test educational SystemVerilog designs.
//!
//! `galena sim <file>` prints a module summary, its primitive-gate count,
//! and (for combinational modules) a truth table, optionally checking a
//! JSON test file. `galena test <path>` discovers `.sv` files
//! recursively, pairs each with a sibling `.json`, runs them on worker
//! threads, and reports a summary; the exit code is nonzero if anything
//! failed.

#![warn(missing_docs)]

mod config;
mod sim;
mod test;

use clap::{Parser, Subcommand};
use std::process;

/// Galena, a cycle-based simulator for a SystemVerilog subset.
#[derive(Parser, Debug)]
#[command(name = "galena", version, about = "Galena SystemVerilog simulator")]
pub struct Cli {
    /// Suppress all output except errors and the final summary.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a custom `galena.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate a single module: summary, gate count, truth table, tests.
    Sim(SimArgs),
    /// Discover and test every module under a path.
    Test(TestArgs),
}

/// Arguments for `galena sim`.
#[derive(Parser, Debug)]
pub struct SimArgs {
    /// The `.sv` file to simulate; the module name is its stem.
    pub file: String,

    /// A JSON test file to check against the module.
    #[arg(short, long)]
    pub test: Option<String>,

    /// Maximum number of truth-table rows to enumerate.
    #[arg(long)]
    pub max_combinations: Option<usize>,

    /// Skip truth-table enumeration.
    #[arg(long)]
    pub no_table: bool,

    /// Clear the module cache before running.
    #[arg(long)]
    pub clear_cache: bool,
}

/// Arguments for `galena test`.
#[derive(Parser, Debug)]
pub struct TestArgs {
    /// A `.sv` file or a directory searched recursively.
    pub path: String,

    /// Number of worker threads (default: one per CPU, capped by files).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Only test files whose path contains this substring.
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum truth-table rows used to exercise untested modules.
    #[arg(long)]
    pub max_combinations: Option<usize>,
}

/// Global settings shared by the subcommands.
pub struct GlobalArgs {
    /// Whether to suppress per-case output.
    pub quiet: bool,
    /// The loaded configuration.
    pub config: config::Config,
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let global = GlobalArgs {
        quiet: cli.quiet,
        config,
    };

    let result = match cli.command {
        Command::Sim(ref args) => sim::run(args, &global),
        Command::Test(ref args) => test::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
