//! In-memory dataset stores
//!
//! Back single-process runs and tests. Every store is safe to share behind
//! an `Arc`.

use async_trait::async_trait;
use fundflow_core::domain::dataset::{
    BuildProject, DatasetDefinition, ProviderSourceDataset, ProviderSourceDatasetVersion,
    TableLoadResult,
};
use fundflow_core::domain::provider::ProviderSummary;
use fundflow_core::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::repository::{
    BuildProjectRepository, DatasetDefinitionRepository, NewVersion, ProviderRepository,
    ProviderSourceDatasetRepository, TableReader,
};
use crate::engine::DatasetFetcher;

/// Definitions, build projects and uploaded table data
#[derive(Default)]
pub struct InMemoryDatasetStore {
    definitions: RwLock<HashMap<String, DatasetDefinition>>,
    build_projects: RwLock<HashMap<String, BuildProject>>,
    blobs: RwLock<HashMap<String, Vec<TableLoadResult>>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_definition(&self, definition: DatasetDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.id.clone(), definition);
    }

    pub async fn add_build_project(&self, project: BuildProject) {
        self.build_projects
            .write()
            .await
            .insert(project.specification_id.clone(), project);
    }

    pub async fn put_blob(&self, blob_name: &str, tables: Vec<TableLoadResult>) {
        self.blobs
            .write()
            .await
            .insert(blob_name.to_string(), tables);
    }
}

#[async_trait]
impl DatasetDefinitionRepository for InMemoryDatasetStore {
    async fn get_dataset_definition(
        &self,
        definition_id: &str,
    ) -> Result<Option<DatasetDefinition>, StoreError> {
        Ok(self.definitions.read().await.get(definition_id).cloned())
    }
}

#[async_trait]
impl BuildProjectRepository for InMemoryDatasetStore {
    async fn get_build_project_by_specification_id(
        &self,
        specification_id: &str,
    ) -> Result<Option<BuildProject>, StoreError> {
        Ok(self.build_projects.read().await.get(specification_id).cloned())
    }
}

#[async_trait]
impl TableReader for InMemoryDatasetStore {
    async fn read_tables(
        &self,
        blob_name: &str,
        _definition: &DatasetDefinition,
    ) -> Result<Option<Vec<TableLoadResult>>, StoreError> {
        Ok(self.blobs.read().await.get(blob_name).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryProviderRepository {
    providers: RwLock<Vec<ProviderSummary>>,
    scopes: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryProviderRepository {
    pub fn new(providers: Vec<ProviderSummary>) -> Self {
        Self {
            providers: RwLock::new(providers),
            scopes: RwLock::default(),
        }
    }
}

#[async_trait]
impl ProviderRepository for InMemoryProviderRepository {
    async fn get_all_providers(&self) -> Result<Vec<ProviderSummary>, StoreError> {
        Ok(self.providers.read().await.clone())
    }

    async fn get_scoped_providers(
        &self,
        specification_id: &str,
    ) -> Result<Vec<ProviderSummary>, StoreError> {
        let scopes = self.scopes.read().await;
        let Some(scope) = scopes.get(specification_id) else {
            return Ok(Vec::new());
        };

        Ok(self
            .providers
            .read()
            .await
            .iter()
            .filter(|p| scope.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn refresh_scoped_providers(
        &self,
        specification_id: &str,
        provider_ids: &[String],
    ) -> Result<usize, StoreError> {
        let mut ids = provider_ids.to_vec();
        ids.sort();
        ids.dedup();
        let count = ids.len();

        self.scopes
            .write()
            .await
            .insert(specification_id.to_string(), ids);

        Ok(count)
    }
}

/// Current provider source data plus its version history
#[derive(Default)]
pub struct InMemoryProviderSourceDatasetRepository {
    current: RwLock<BTreeMap<String, ProviderSourceDataset>>,
    history: RwLock<HashMap<String, Vec<ProviderSourceDatasetVersion>>>,
}

impl InMemoryProviderSourceDatasetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_current(&self, id: &str) -> Option<ProviderSourceDataset> {
        self.current.read().await.get(id).cloned()
    }

    /// History of one entity, oldest first
    pub async fn get_versions(&self, entity_id: &str) -> Vec<ProviderSourceDatasetVersion> {
        let mut versions = self
            .history
            .read()
            .await
            .get(entity_id)
            .cloned()
            .unwrap_or_default();
        versions.sort_by_key(|v| v.version);
        versions
    }
}

#[async_trait]
impl ProviderSourceDatasetRepository for InMemoryProviderSourceDatasetRepository {
    async fn get_current_provider_source_datasets(
        &self,
        specification_id: &str,
        relationship_id: &str,
    ) -> Result<Vec<ProviderSourceDataset>, StoreError> {
        Ok(self
            .current
            .read()
            .await
            .values()
            .filter(|d| {
                d.specification_id == specification_id && d.data_relationship.id == relationship_id
            })
            .cloned()
            .collect())
    }

    async fn create_version(
        &self,
        new: NewVersion,
        current: Option<&ProviderSourceDatasetVersion>,
    ) -> Result<ProviderSourceDatasetVersion, StoreError> {
        let history = self.history.read().await;
        let latest = history
            .get(&new.entity_id)
            .and_then(|versions| versions.iter().max_by_key(|v| v.version))
            .into_iter()
            .chain(current)
            .max_by_key(|v| v.version);

        Ok(match latest {
            Some(latest) => latest.next(new.rows, new.author, new.date),
            None => ProviderSourceDatasetVersion::initial(
                new.entity_id,
                new.provider_id,
                new.rows,
                new.author,
                new.date,
            ),
        })
    }

    async fn update_current_provider_source_datasets(
        &self,
        datasets: &[ProviderSourceDataset],
    ) -> Result<(), StoreError> {
        let mut current = self.current.write().await;
        for dataset in datasets {
            current.insert(dataset.id.clone(), dataset.clone());
        }
        Ok(())
    }

    async fn update_provider_source_dataset_history(
        &self,
        versions: &[ProviderSourceDatasetVersion],
    ) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        for version in versions {
            let entry = history.entry(version.entity_id.clone()).or_default();
            if entry.iter().any(|v| v.version == version.version) {
                return Err(StoreError::Conflict(version.id.clone()));
            }
            entry.push(version.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DatasetFetcher for InMemoryProviderSourceDatasetRepository {
    async fn fetch(
        &self,
        provider_id: &str,
        specification_id: &str,
    ) -> Result<Option<Vec<ProviderSourceDataset>>, StoreError> {
        let datasets: Vec<ProviderSourceDataset> = self
            .current
            .read()
            .await
            .values()
            .filter(|d| d.provider_id == provider_id && d.specification_id == specification_id)
            .cloned()
            .collect();

        Ok((!datasets.is_empty()).then_some(datasets))
    }
}
