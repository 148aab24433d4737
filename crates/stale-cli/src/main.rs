//! Command-line harness for the stale-state policy
//!
//! Runs the policy against a simulated replica set with lagging members, and
//! prints majority thresholds for a given probe count.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod replica;

use commands::{simulate::SimulateArgs, threshold::ThresholdArgs};

#[derive(Parser)]
#[command(name = "stale")]
#[command(about = "Stale-state - quorum verification for stale replica reads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (TOML or JSON)
    #[arg(short, long, global = true, default_value = "stale.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a simulated replica set through the policy
    Simulate(SimulateArgs),

    /// Show the majority threshold for a probe count
    Threshold(ThresholdArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Simulate(args) => commands::simulate::handle_simulate_command(args, config).await?,
        Commands::Threshold(args) => commands::threshold::handle_threshold_command(args, &config)?,
    }

    Ok(())
}
