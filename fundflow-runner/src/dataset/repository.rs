//! Dataset pipeline collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundflow_core::domain::calculation::Reference;
use fundflow_core::domain::dataset::{
    BuildProject, DatasetDefinition, ProviderSourceDataset, ProviderSourceDatasetVersion, Row,
    TableLoadResult,
};
use fundflow_core::domain::provider::ProviderSummary;
use fundflow_core::error::StoreError;

#[async_trait]
pub trait DatasetDefinitionRepository: Send + Sync {
    async fn get_dataset_definition(
        &self,
        definition_id: &str,
    ) -> Result<Option<DatasetDefinition>, StoreError>;
}

#[async_trait]
pub trait BuildProjectRepository: Send + Sync {
    async fn get_build_project_by_specification_id(
        &self,
        specification_id: &str,
    ) -> Result<Option<BuildProject>, StoreError>;
}

/// Reads the tables of an uploaded dataset file
#[async_trait]
pub trait TableReader: Send + Sync {
    /// `None` when the blob does not exist
    async fn read_tables(
        &self,
        blob_name: &str,
        definition: &DatasetDefinition,
    ) -> Result<Option<Vec<TableLoadResult>>, StoreError>;
}

#[async_trait]
pub trait ProviderRepository: Send + Sync {
    async fn get_all_providers(&self) -> Result<Vec<ProviderSummary>, StoreError>;

    /// Providers a specification's calculations run for
    async fn get_scoped_providers(
        &self,
        specification_id: &str,
    ) -> Result<Vec<ProviderSummary>, StoreError>;

    /// Replaces a specification's scope; returns the number of providers in it
    async fn refresh_scoped_providers(
        &self,
        specification_id: &str,
        provider_ids: &[String],
    ) -> Result<usize, StoreError>;
}

/// Rows for a provider that differ from its current version
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub entity_id: String,
    pub provider_id: String,
    pub rows: Vec<Row>,
    pub author: Reference,
    pub date: DateTime<Utc>,
}

#[async_trait]
pub trait ProviderSourceDatasetRepository: Send + Sync {
    /// Current source data of every provider for one relationship
    async fn get_current_provider_source_datasets(
        &self,
        specification_id: &str,
        relationship_id: &str,
    ) -> Result<Vec<ProviderSourceDataset>, StoreError>;

    /// Builds the version that follows the latest stored one for the entity
    async fn create_version(
        &self,
        new: NewVersion,
        current: Option<&ProviderSourceDatasetVersion>,
    ) -> Result<ProviderSourceDatasetVersion, StoreError>;

    async fn update_current_provider_source_datasets(
        &self,
        datasets: &[ProviderSourceDataset],
    ) -> Result<(), StoreError>;

    async fn update_provider_source_dataset_history(
        &self,
        versions: &[ProviderSourceDatasetVersion],
    ) -> Result<(), StoreError>;
}
