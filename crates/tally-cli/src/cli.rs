//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - background engine for a personal finance tracker
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Recurring transactions, budget alerts, and goal tracking", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Config file path
    #[arg(long, default_value = "tally.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Run one sweep immediately and exit
    Sweep {
        /// What to sweep: all, recurring, alerts, or goals
        #[arg(short, long, default_value = "all")]
        kind: String,

        /// Materialize as of this date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Start the scheduler and run until interrupted
    Run,
}
