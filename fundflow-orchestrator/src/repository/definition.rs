//! Job Definition Repository
//!
//! Read-only catalog of job types. Definitions are reference data: loaded
//! once from a JSON file (or the built-in set) and never mutated.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fundflow_core::domain::definition::{JobDefinition, bus_names, job_definition_ids};
use fundflow_core::error::StoreError;
use std::path::Path;
use std::time::Duration;

#[async_trait]
pub trait JobDefinitionRegistry: Send + Sync {
    async fn get_all_job_definitions(&self) -> Result<Vec<JobDefinition>, StoreError>;
}

/// Registry over a fixed list of definitions
#[derive(Debug, Clone)]
pub struct StaticJobDefinitionRegistry {
    definitions: Vec<JobDefinition>,
}

impl StaticJobDefinitionRegistry {
    pub fn new(definitions: Vec<JobDefinition>) -> Self {
        Self { definitions }
    }

    /// Loads a JSON array of definitions
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job definitions from {}", path.display()))?;
        let definitions: Vec<JobDefinition> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse job definitions in {}", path.display()))?;

        let registry = Self::new(definitions);
        registry.validate()?;
        Ok(registry)
    }

    /// The definitions the platform ships with
    pub fn builtin() -> Self {
        Self::new(vec![
            JobDefinition {
                id: job_definition_ids::CREATE_INSTRUCT_ALLOCATION_JOB.to_string(),
                description: Some("Calculates allocations for every provider in scope".to_string()),
                timeout: Duration::from_secs(30 * 60),
                message_bus_queue: Some(bus_names::CALCULATE_ALLOCATIONS_QUEUE.to_string()),
                message_bus_topic: None,
                supersede_existing_running_job_on_enqueue: true,
                require_specification_id: true,
                require_entity_id: true,
                require_message_body: false,
                require_message_properties: Vec::new(),
            },
            JobDefinition {
                id: job_definition_ids::MAP_DATASET_JOB.to_string(),
                description: Some("Maps a dataset version onto providers".to_string()),
                timeout: Duration::from_secs(12 * 60 * 60),
                message_bus_queue: Some(bus_names::MAP_DATASET_QUEUE.to_string()),
                message_bus_topic: None,
                supersede_existing_running_job_on_enqueue: false,
                require_specification_id: true,
                require_entity_id: true,
                require_message_body: true,
                require_message_properties: Vec::new(),
            },
        ])
    }

    pub fn definitions(&self) -> &[JobDefinition] {
        &self.definitions
    }

    /// Rejects duplicate ids and definitions naming both a queue and a topic
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();

        for definition in &self.definitions {
            if definition.id.trim().is_empty() {
                anyhow::bail!("job definition id cannot be empty");
            }

            if !seen.insert(definition.id.as_str()) {
                anyhow::bail!("duplicate job definition id: {}", definition.id);
            }

            if definition.message_bus_queue.is_some() && definition.message_bus_topic.is_some() {
                anyhow::bail!(
                    "job definition {} cannot target both a queue and a topic",
                    definition.id
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl JobDefinitionRegistry for StaticJobDefinitionRegistry {
    async fn get_all_job_definitions(&self) -> Result<Vec<JobDefinition>, StoreError> {
        Ok(self.definitions.clone())
    }
}
