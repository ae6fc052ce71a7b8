//! Tally CLI - background finance engine
//!
//! Usage:
//!   tally init                Initialize database
//!   tally sweep --kind all    Run one sweep immediately
//!   tally run                 Start the scheduler (Ctrl-C to stop)

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Sweep { kind, as_of } => {
            commands::cmd_sweep(&cli.db, &cli.config, &kind, as_of.as_deref()).await
        }
        Commands::Run => commands::cmd_run(&cli.db, &cli.config).await,
    }
}
