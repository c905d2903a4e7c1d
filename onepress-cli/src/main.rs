//! OnePress CLI - Command-line interface
//!
//! This binary provides a command-line interface to the OnePress library:
//! the long-running `run` pipeline plus config, status, and diagnostics
//! helpers.

mod commands;
mod error;
mod panic_handler;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "onepress")]
#[command(version = onepress::VERSION)]
#[command(about = "Coalescing single-flight print pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the press pipeline until Ctrl+C
    Run {
        /// Path to an alternate config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seconds between status lines (0 disables them)
        #[arg(long, default_value = "30")]
        status_interval: u64,

        /// Enable debug-level logging
        #[arg(long)]
        debug: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show persisted counters and the last outcome
    Status {
        /// Path to an alternate config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a system report for bug reports
    Diagnostics,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            status_interval,
            debug,
        } => commands::run::run(RunArgs {
            config,
            status_interval,
            debug,
        }),
        Commands::Config { command } => commands::config::run(command),
        Commands::Status { config } => commands::status::run(config.as_deref()),
        Commands::Diagnostics => commands::diagnostics::run(),
    };

    if let Err(e) = result {
        e.exit();
    }
}
