//! Dataset DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::calculation::Reference;
use crate::domain::dataset::Dataset;

/// Body of a map-dataset job message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProcessRequest {
    pub dataset: Dataset,
    pub specification_id: String,
    pub relationship_id: String,
    pub version: i32,
    pub user: Reference,
}
