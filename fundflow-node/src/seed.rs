//! Seed data for the in-memory stores
//!
//! A node starts with empty stores; a seed file fills in providers, dataset
//! definitions, build projects, calculations and uploaded table data.

use anyhow::Context;
use fundflow_core::domain::calculation::Calculation;
use fundflow_core::domain::dataset::{BuildProject, DatasetDefinition, TableLoadResult};
use fundflow_core::domain::provider::ProviderSummary;
use fundflow_runner::dataset::InMemoryDatasetStore;
use fundflow_runner::engine::repository::InMemoryCalculationRepository;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(default)]
    pub providers: Vec<ProviderSummary>,
    #[serde(default)]
    pub dataset_definitions: Vec<DatasetDefinition>,
    #[serde(default)]
    pub build_projects: Vec<BuildProject>,
    /// Calculations keyed by specification id
    #[serde(default)]
    pub calculations: HashMap<String, Vec<Calculation>>,
    /// Table data keyed by blob name
    #[serde(default)]
    pub blobs: HashMap<String, Vec<TableLoadResult>>,
}

impl Seed {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed data from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed data in {}", path.display()))
    }

    /// Loads everything except providers, which seed the provider repository
    /// directly.
    pub async fn apply(
        self,
        store: &InMemoryDatasetStore,
        calculations: &InMemoryCalculationRepository,
    ) {
        for definition in self.dataset_definitions {
            store.add_definition(definition).await;
        }
        for project in self.build_projects {
            store.add_build_project(project).await;
        }
        for (blob_name, tables) in self.blobs {
            store.put_blob(&blob_name, tables).await;
        }
        for (specification_id, catalog) in self.calculations {
            calculations.set_calculations(&specification_id, catalog).await;
        }
    }
}
