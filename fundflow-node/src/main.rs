//! Fundflow node
//!
//! Command-line entry point for running job management and allocation
//! workers.

mod commands;
mod config;
mod seed;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fundflow")]
#[command(about = "Funding allocation job runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fundflow_node=info,fundflow_core=info,fundflow_orchestrator=info,fundflow_runner=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    handle_command(Cli::parse().command).await
}
