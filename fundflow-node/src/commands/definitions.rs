//! Job definition commands

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use fundflow_core::domain::definition::{Destination, JobDefinition};
use fundflow_orchestrator::repository::StaticJobDefinitionRegistry;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DefinitionCommands {
    /// List job definitions
    List {
        /// JSON file of job definitions (built-in set when omitted)
        #[arg(long, env = "JOB_DEFINITIONS_PATH")]
        file: Option<PathBuf>,
    },
    /// Check a job definitions file
    Validate {
        /// JSON file of job definitions
        file: PathBuf,
    },
}

pub fn handle_definition_command(command: DefinitionCommands) -> Result<()> {
    match command {
        DefinitionCommands::List { file } => {
            let registry = match file {
                Some(path) => StaticJobDefinitionRegistry::from_json_file(&path)?,
                None => StaticJobDefinitionRegistry::builtin(),
            };
            list_definitions(registry.definitions());
            Ok(())
        }
        DefinitionCommands::Validate { file } => validate_definitions(&file),
    }
}

fn list_definitions(definitions: &[JobDefinition]) {
    if definitions.is_empty() {
        println!("{}", "No job definitions.".yellow());
        return;
    }

    println!(
        "{}",
        format!("Found {} job definition(s):", definitions.len()).bold()
    );
    println!();

    for definition in definitions {
        println!("  {} {}", "▸".cyan(), definition.id.bold());
        if let Some(description) = &definition.description {
            println!("    {}", description.dimmed());
        }
        println!("    Timeout:      {}s", definition.timeout.as_secs());
        println!("    Destination:  {}", describe_destination(definition));
        println!(
            "    Supersedes:   {}",
            if definition.supersede_existing_running_job_on_enqueue {
                "yes".green()
            } else {
                "no".normal()
            }
        );
        println!();
    }
}

fn describe_destination(definition: &JobDefinition) -> ColoredString {
    match definition.destination() {
        Some(Destination::Queue(queue)) => format!("queue {}", queue).normal(),
        Some(Destination::Topic(topic)) => format!("topic {}", topic).normal(),
        None => "none".dimmed(),
    }
}

fn validate_definitions(file: &Path) -> Result<()> {
    match StaticJobDefinitionRegistry::from_json_file(file) {
        Ok(registry) => {
            println!(
                "{} {} job definition(s) in {}",
                "✓".green(),
                registry.definitions().len(),
                file.display()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {:#}", "✗".red(), e);
            Err(e)
        }
    }
}
