//! Dataset pipeline errors

use fundflow_core::error::{BusError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset definition {0} not found")]
    DefinitionNotFound(String),

    #[error("build project for specification {0} not found")]
    BuildProjectNotFound(String),

    #[error("relationship {relationship_id} not found on specification {specification_id}")]
    RelationshipNotFound {
        relationship_id: String,
        specification_id: String,
    },

    #[error("version {version} of dataset {dataset_id} not found")]
    VersionNotFound { dataset_id: String, version: i32 },

    #[error("no table data found in {0}")]
    TableDataMissing(String),

    #[error("table definition {0} not found on the dataset definition")]
    TableDefinitionNotFound(String),

    #[error("table {0} has no identifier field")]
    IdentifierFieldMissing(String),

    #[error("pipeline task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize rows: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}
