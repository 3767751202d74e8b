//! Kino Ads CLI - Ad break scenario runner
//!
//! Features:
//! - Scenario replay against a simulated playback surface
//! - Deterministic timers, or real tokio timers through the session loop
//! - Signal and configuration reference

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod report;
mod scenario;

/// Kino Ads CLI - Linear ad break simulator
#[derive(Parser)]
#[command(name = "kino-ads")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Replay ad break scenarios against a simulated player", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario with simulated timers
    Simulate {
        /// Path to scenario JSON
        scenario: PathBuf,

        /// Configuration file overriding the scenario's own
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fire seekable re-checks as soon as they are scheduled
        #[arg(long)]
        immediate_timers: bool,
    },

    /// Replay a scenario through the async session loop with real timers
    Run {
        /// Path to scenario JSON
        scenario: PathBuf,

        /// Configuration file overriding the scenario's own
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List recognized signal names
    Signals,

    /// Print the default configuration
    Config {
        /// Validate a configuration file instead
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for reports
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate { scenario, config, immediate_timers } => {
            commands::simulate(&scenario, config.as_deref(), immediate_timers, &cli.format)?;
        }
        Commands::Run { scenario, config } => {
            commands::run(&scenario, config.as_deref(), &cli.format).await?;
        }
        Commands::Signals => {
            commands::signals(&cli.format)?;
        }
        Commands::Config { check } => {
            commands::config(check.as_deref())?;
        }
    }

    Ok(())
}
