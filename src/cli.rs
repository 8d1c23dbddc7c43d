use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-source yield router: validate scenario files, generate their schema,
/// and simulate keeper-driven allocation across yield venues.
#[derive(Parser)]
#[command(name = "yield-router", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for scenario files
    Schema,

    /// Output an example scenario JSON to stdout
    Example,

    /// Validate a scenario JSON file
    Validate {
        /// Path to the scenario JSON file
        file: PathBuf,
    },

    /// Simulate a scenario: simulated venues, seeded deposits, keeper harvests and rebalances
    Simulate {
        /// Path to the scenario JSON file
        file: PathBuf,

        /// Simulated duration in days
        #[arg(long, default_value = "90")]
        days: u64,

        /// Hours between clock ticks
        #[arg(long, default_value = "24")]
        step_hours: u64,

        /// Random seed for APY jitter
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the final ledger, optimizer and strategy state to this file
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Print tick-by-tick output and debug logs
        #[arg(long)]
        verbose: bool,
    },
}
