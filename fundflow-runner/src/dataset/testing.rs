//! Shared fixtures for dataset and worker tests

use chrono::Utc;
use fundflow_core::domain::calculation::Reference;
use fundflow_core::domain::dataset::{
    BuildProject, Dataset, DatasetDefinition, DatasetRelationship, DatasetVersion,
    FieldDefinition, Row, TableDefinition, TableLoadResult,
};
use fundflow_core::domain::provider::{IdentifierFieldType, ProviderSummary};
use fundflow_core::dto::dataset::DatasetProcessRequest;
use fundflow_core::messaging::InMemoryBus;
use fundflow_core::resilience::ResiliencePolicy;
use serde_json::json;
use std::sync::Arc;

use super::memory::{
    InMemoryDatasetStore, InMemoryProviderRepository, InMemoryProviderSourceDatasetRepository,
};
use super::pipeline::{DatasetPipeline, DatasetRepositories};
use crate::config::DatasetPipelineConfig;

pub const SPEC: &str = "S1";
pub const DEFINITION: &str = "def-pupils";
pub const SCOPING: &str = "rel-scope";
pub const EXTRA: &str = "rel-extra";

pub fn row(urn: &str, pupils: i64) -> Row {
    let mut row = Row::new();
    row.insert("URN".to_string(), json!(urn));
    row.insert("Pupils".to_string(), json!(pupils));
    row
}

pub fn providers() -> Vec<ProviderSummary> {
    ["100001", "100002", "100003"]
        .iter()
        .enumerate()
        .map(|(i, urn)| ProviderSummary {
            id: format!("p{}", i + 1),
            name: format!("School {}", i + 1),
            urn: Some(urn.to_string()),
            ..ProviderSummary::default()
        })
        .collect()
}

pub fn definition(with_identifier: bool) -> DatasetDefinition {
    DatasetDefinition {
        id: DEFINITION.to_string(),
        name: "Pupil Numbers".to_string(),
        table_definitions: vec![TableDefinition {
            id: "t1".to_string(),
            name: "Pupils".to_string(),
            field_definitions: vec![
                FieldDefinition {
                    id: "f1".to_string(),
                    name: "URN".to_string(),
                    identifier_field_type: with_identifier.then_some(IdentifierFieldType::Urn),
                },
                FieldDefinition {
                    id: "f2".to_string(),
                    name: "Pupils".to_string(),
                    identifier_field_type: None,
                },
            ],
        }],
    }
}

pub fn build_project() -> BuildProject {
    BuildProject {
        id: "bp1".to_string(),
        specification_id: SPEC.to_string(),
        dataset_relationships: vec![
            DatasetRelationship {
                id: SCOPING.to_string(),
                name: "Pupils".to_string(),
                definition_id: DEFINITION.to_string(),
                defines_scope: true,
            },
            DatasetRelationship {
                id: EXTRA.to_string(),
                name: "Extra Pupils".to_string(),
                definition_id: DEFINITION.to_string(),
                defines_scope: false,
            },
        ],
    }
}

pub fn blob_name(version: i32) -> String {
    format!("ds1/v{}/pupils.xlsx", version)
}

pub fn request(relationship_id: &str, version: i32) -> DatasetProcessRequest {
    let author = Reference::new("u1", "Data Admin");
    DatasetProcessRequest {
        dataset: Dataset {
            id: "ds1".to_string(),
            name: "Pupil Numbers 2026".to_string(),
            definition: Reference::new(DEFINITION, "Pupil Numbers"),
            history: (1..=3)
                .map(|v| DatasetVersion {
                    version: v,
                    blob_name: blob_name(v),
                    author: author.clone(),
                    date: Utc::now(),
                })
                .collect(),
        },
        specification_id: SPEC.to_string(),
        relationship_id: relationship_id.to_string(),
        version,
        user: author,
    }
}

pub struct PipelineFixture {
    pub pipeline: Arc<DatasetPipeline>,
    pub store: Arc<InMemoryDatasetStore>,
    pub providers: Arc<InMemoryProviderRepository>,
    pub sources: Arc<InMemoryProviderSourceDatasetRepository>,
    pub bus: InMemoryBus,
}

impl PipelineFixture {
    pub async fn new() -> Self {
        Self::with_definition(definition(true)).await
    }

    pub async fn with_definition(definition: DatasetDefinition) -> Self {
        let store = Arc::new(InMemoryDatasetStore::new());
        store.add_definition(definition).await;
        store.add_build_project(build_project()).await;

        let providers = Arc::new(InMemoryProviderRepository::new(providers()));
        let sources = Arc::new(InMemoryProviderSourceDatasetRepository::new());
        let bus = InMemoryBus::new();

        let pipeline = DatasetPipeline::new(
            DatasetRepositories {
                definitions: store.clone(),
                build_projects: store.clone(),
                tables: store.clone(),
                providers: providers.clone(),
                sources: sources.clone(),
            },
            Arc::new(bus.clone()),
            ResiliencePolicy::passthrough("test"),
            DatasetPipelineConfig::default(),
        );

        Self {
            pipeline: Arc::new(pipeline),
            store,
            providers,
            sources,
            bus,
        }
    }

    pub async fn upload(&self, version: i32, rows: Vec<Row>) {
        self.store
            .put_blob(
                &blob_name(version),
                vec![TableLoadResult {
                    table_definition_id: "t1".to_string(),
                    rows,
                }],
            )
            .await;
    }
}
