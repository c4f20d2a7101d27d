//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod definitions;
mod serve;

pub use definitions::DefinitionCommands;
pub use serve::ServeArgs;

use anyhow::Result;
use clap::Subcommand;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run job management and the workers in one process
    Serve(ServeArgs),
    /// Inspect job definitions
    Definitions {
        #[command(subcommand)]
        command: DefinitionCommands,
    },
}

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve(args) => serve::serve(args).await,
        Commands::Definitions { command } => definitions::handle_definition_command(command),
    }
}
