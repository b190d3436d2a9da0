//! tillroll - receipt scanning front-end for Google Cloud Document AI
//!
//! Usage:
//!   tillroll scan receipt.jpg          Process a receipt and show the result
//!   tillroll scan --json receipt.pdf   Print the extracted record as JSON
//!   tillroll watch ./intake            Process receipts dropped into a folder
//!   tillroll check                     Validate configuration

mod cli;
mod commands;
mod display;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

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
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    let config = commands::resolve_config(&cli)?;

    match &cli.command {
        Commands::Scan { files, json, raw } => commands::cmd_scan(config, files, *json, *raw).await,
        Commands::Watch { dir, json, settle_ms } => {
            commands::cmd_watch(config, dir, *json, Duration::from_millis(*settle_ms)).await
        }
        Commands::Check => commands::cmd_check(config),
    }
}
