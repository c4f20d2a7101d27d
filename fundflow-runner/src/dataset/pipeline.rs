//! Dataset pipeline
//!
//! Maps an uploaded dataset version onto providers and stores a new
//! provider source dataset version for every provider whose rows changed.
//! When the dataset's relationship defines the specification's scope, the
//! scope is rebuilt and a calculation job is requested.

use chrono::Utc;
use fundflow_core::domain::calculation::Reference;
use fundflow_core::domain::dataset::{ProviderSourceDataset, ProviderSourceDatasetVersion};
use fundflow_core::domain::job::Trigger;
use fundflow_core::dto::dataset::DatasetProcessRequest;
use fundflow_core::dto::job::JobCreateModel;
use fundflow_core::messaging::{Message, MessageSender, properties};
use fundflow_core::resilience::ResiliencePolicy;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::cache::{ProviderIndexCache, TableCache};
use super::error::DatasetError;
use super::grouping::{GroupedRows, group_rows_by_provider};
use super::index::ProviderIndex;
use super::repository::{
    BuildProjectRepository, DatasetDefinitionRepository, NewVersion, ProviderRepository,
    ProviderSourceDatasetRepository, TableReader,
};
use crate::config::DatasetPipelineConfig;

/// Stores the pipeline reads from and writes to
#[derive(Clone)]
pub struct DatasetRepositories {
    pub definitions: Arc<dyn DatasetDefinitionRepository>,
    pub build_projects: Arc<dyn BuildProjectRepository>,
    pub tables: Arc<dyn TableReader>,
    pub providers: Arc<dyn ProviderRepository>,
    pub sources: Arc<dyn ProviderSourceDatasetRepository>,
}

/// What one processing run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetProcessSummary {
    pub rows_processed: usize,
    pub rows_unmatched: usize,
    pub providers_matched: usize,
    pub versions_created: usize,
    pub providers_unchanged: usize,
    /// Providers in scope after a refresh, `None` when the scope was untouched
    pub scoped_providers: Option<usize>,
}

pub struct DatasetPipeline {
    repositories: DatasetRepositories,
    sender: Arc<dyn MessageSender>,
    policy: ResiliencePolicy,
    config: DatasetPipelineConfig,
    tables: TableCache,
    provider_index: ProviderIndexCache,
}

impl DatasetPipeline {
    pub fn new(
        repositories: DatasetRepositories,
        sender: Arc<dyn MessageSender>,
        policy: ResiliencePolicy,
        config: DatasetPipelineConfig,
    ) -> Self {
        let tables = TableCache::new(config.table_cache_capacity, config.table_cache_ttl);
        let provider_index = ProviderIndexCache::new(config.provider_cache_ttl);

        Self {
            repositories,
            sender,
            policy,
            config,
            tables,
            provider_index,
        }
    }

    /// Processes one dataset version for one specification relationship
    pub async fn process_dataset(
        &self,
        request: &DatasetProcessRequest,
        correlation_id: Option<&str>,
    ) -> Result<DatasetProcessSummary, DatasetError> {
        let started = Instant::now();
        let specification_id = request.specification_id.as_str();
        let repos = &self.repositories;

        let definition_id = request.dataset.definition.id.as_str();
        let definition = self
            .policy
            .execute(|| repos.definitions.get_dataset_definition(definition_id))
            .await?
            .ok_or_else(|| DatasetError::DefinitionNotFound(definition_id.to_string()))?;

        let build_project = self
            .policy
            .execute(|| {
                repos
                    .build_projects
                    .get_build_project_by_specification_id(specification_id)
            })
            .await?
            .ok_or_else(|| DatasetError::BuildProjectNotFound(specification_id.to_string()))?;

        let relationship = build_project
            .relationship(&request.relationship_id)
            .cloned()
            .ok_or_else(|| DatasetError::RelationshipNotFound {
                relationship_id: request.relationship_id.clone(),
                specification_id: specification_id.to_string(),
            })?;

        let version = request.dataset.version(request.version).ok_or_else(|| {
            DatasetError::VersionNotFound {
                dataset_id: request.dataset.id.clone(),
                version: request.version,
            }
        })?;

        let tables = match self.tables.get(&definition.id, &version.blob_name).await {
            Some(tables) => tables,
            None => {
                let loaded = self
                    .policy
                    .execute(|| repos.tables.read_tables(&version.blob_name, &definition))
                    .await?
                    .filter(|tables| !tables.is_empty())
                    .ok_or_else(|| DatasetError::TableDataMissing(version.blob_name.clone()))?;
                let loaded = Arc::new(loaded);
                self.tables
                    .insert(&definition.id, &version.blob_name, loaded.clone())
                    .await;
                loaded
            }
        };

        // Only the first table of a dataset carries provider rows.
        let table = tables
            .first()
            .ok_or_else(|| DatasetError::TableDataMissing(version.blob_name.clone()))?;
        let table_definition = definition
            .table_definitions
            .iter()
            .find(|t| t.id == table.table_definition_id)
            .ok_or_else(|| {
                DatasetError::TableDefinitionNotFound(table.table_definition_id.clone())
            })?;
        let (field, kind) = table_definition
            .identifier_field()
            .ok_or_else(|| DatasetError::IdentifierFieldMissing(table_definition.name.clone()))?;

        let index = self.provider_index().await?;
        let grouped = {
            let tables = tables.clone();
            let field_name = field.name.clone();
            tokio::task::spawn_blocking(move || {
                group_rows_by_provider(&tables[0].rows, &field_name, kind, &index)
            })
            .await
            .map_err(|err| DatasetError::Task(err.to_string()))?
        };

        let mut summary = DatasetProcessSummary {
            rows_processed: table.rows.len(),
            rows_unmatched: grouped.unmatched,
            providers_matched: grouped.rows_by_provider.len(),
            ..DatasetProcessSummary::default()
        };

        if grouped.unmatched > 0 {
            warn!(
                specification_id,
                dataset_id = %request.dataset.id,
                "{} row(s) matched no provider",
                grouped.unmatched
            );
        }

        let existing: HashMap<String, ProviderSourceDataset> = self
            .policy
            .execute(|| {
                repos
                    .sources
                    .get_current_provider_source_datasets(specification_id, &relationship.id)
            })
            .await?
            .into_iter()
            .map(|dataset| (dataset.provider_id.clone(), dataset))
            .collect();

        let author = request.user.clone();
        let versions = self
            .save_versions(request, &relationship.id, &grouped, &existing, author)
            .await?;

        summary.versions_created = versions.len();
        summary.providers_unchanged = summary.providers_matched - versions.len();

        if !versions.is_empty() {
            let data_relationship = Reference::new(&relationship.id, &relationship.name);
            let data_definition = Reference::new(&definition.id, &definition.name);
            let current: Vec<ProviderSourceDataset> = versions
                .iter()
                .map(|version| ProviderSourceDataset {
                    id: version.entity_id.clone(),
                    specification_id: specification_id.to_string(),
                    provider_id: version.provider_id.clone(),
                    data_relationship: data_relationship.clone(),
                    data_definition: data_definition.clone(),
                    dataset_id: request.dataset.id.clone(),
                    current: version.clone(),
                })
                .collect();

            self.policy
                .execute(|| repos.sources.update_current_provider_source_datasets(&current))
                .await?;
            self.policy
                .execute(|| repos.sources.update_provider_source_dataset_history(&versions))
                .await?;
        }

        self.provider_index.invalidate().await;

        if relationship.defines_scope {
            let provider_ids: Vec<String> = grouped.rows_by_provider.keys().cloned().collect();
            let scoped = self
                .policy
                .execute(|| {
                    repos
                        .providers
                        .refresh_scoped_providers(specification_id, &provider_ids)
                })
                .await?;
            summary.scoped_providers = Some(scoped);

            self.request_calculation(request, &relationship.id, &definition.name, correlation_id)
                .await?;
        }

        info!(
            specification_id,
            dataset_id = %request.dataset.id,
            relationship_id = %relationship.id,
            "Processed {} row(s) for {} provider(s): {} new version(s), {} unchanged in {:?}",
            summary.rows_processed,
            summary.providers_matched,
            summary.versions_created,
            summary.providers_unchanged,
            started.elapsed()
        );

        Ok(summary)
    }

    /// Creates a version for every provider whose rows differ from its
    /// current ones, at most `save_concurrency` at a time.
    async fn save_versions(
        &self,
        request: &DatasetProcessRequest,
        relationship_id: &str,
        grouped: &GroupedRows,
        existing: &HashMap<String, ProviderSourceDataset>,
        author: Reference,
    ) -> Result<Vec<ProviderSourceDatasetVersion>, DatasetError> {
        let semaphore = Arc::new(Semaphore::new(self.config.save_concurrency));
        let date = Utc::now();
        let mut pending = Vec::new();

        for (provider_id, rows) in &grouped.rows_by_provider {
            let current = existing.get(provider_id).map(|d| &d.current);

            if let Some(current) = current {
                if current.has_same_rows(rows)? {
                    debug!(provider_id = %provider_id, "Provider rows unchanged");
                    continue;
                }
            }

            let new = NewVersion {
                entity_id: ProviderSourceDataset::id_for(
                    &request.specification_id,
                    relationship_id,
                    provider_id,
                ),
                provider_id: provider_id.clone(),
                rows: rows.clone(),
                author: author.clone(),
                date,
            };
            let semaphore = semaphore.clone();
            let sources = &self.repositories.sources;
            let policy = &self.policy;

            pending.push(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|err| DatasetError::Task(err.to_string()))?;
                let version = policy
                    .execute(|| sources.create_version(new.clone(), current))
                    .await?;
                Ok::<_, DatasetError>(version)
            });
        }

        try_join_all(pending).await
    }

    async fn provider_index(&self) -> Result<Arc<ProviderIndex>, DatasetError> {
        if let Some(index) = self.provider_index.get().await {
            return Ok(index);
        }

        let providers = self
            .policy
            .execute(|| self.repositories.providers.get_all_providers())
            .await?;
        let index = Arc::new(ProviderIndex::build(&providers));
        self.provider_index.insert(index.clone()).await;

        debug!("Indexed {} provider(s)", index.provider_count());
        Ok(index)
    }

    async fn request_calculation(
        &self,
        request: &DatasetProcessRequest,
        relationship_id: &str,
        definition_name: &str,
        correlation_id: Option<&str>,
    ) -> Result<(), DatasetError> {
        let specification_id = &request.specification_id;

        let model = JobCreateModel {
            job_definition_id: self.config.calculation_job_definition_id.clone(),
            specification_id: Some(specification_id.clone()),
            invoker_user_id: Some(request.user.id.clone()),
            invoker_user_display_name: Some(request.user.name.clone()),
            trigger: Some(Trigger {
                entity_id: Some(request.dataset.id.clone()),
                entity_type: Some("Dataset".to_string()),
                message: format!(
                    "Scoping dataset '{}' ({}) was updated",
                    request.dataset.name, definition_name
                ),
            }),
            correlation_id: correlation_id.map(str::to_string),
            ..JobCreateModel::default()
        };

        let mut props = HashMap::from([
            (properties::SPECIFICATION_ID.to_string(), specification_id.clone()),
            (properties::RELATIONSHIP_ID.to_string(), relationship_id.to_string()),
            (properties::USER_ID.to_string(), request.user.id.clone()),
            (properties::USER_NAME.to_string(), request.user.name.clone()),
        ]);
        if let Some(correlation_id) = correlation_id {
            props.insert(properties::CORRELATION_ID.to_string(), correlation_id.to_string());
        }

        let message = Message::json(&model, props)?;
        self.sender
            .send_to_queue(&self.config.job_request_queue, message)
            .await?;

        info!(
            specification_id = %specification_id,
            "Requested {} after scope change",
            self.config.calculation_job_definition_id
        );
        Ok(())
    }
}
