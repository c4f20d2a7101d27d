//! Job definition reference data

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution metadata for a job type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// How long a job may stay uncompleted before the sweep times it out
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    #[serde(default)]
    pub message_bus_queue: Option<String>,
    #[serde(default)]
    pub message_bus_topic: Option<String>,
    #[serde(default)]
    pub supersede_existing_running_job_on_enqueue: bool,
    #[serde(default)]
    pub require_specification_id: bool,
    #[serde(default)]
    pub require_entity_id: bool,
    #[serde(default)]
    pub require_message_body: bool,
    #[serde(default)]
    pub require_message_properties: Vec<String>,
}

/// Identifiers of the job definitions shipped with the platform
pub mod job_definition_ids {
    pub const CREATE_INSTRUCT_ALLOCATION_JOB: &str = "CreateInstructAllocationJob";
    pub const MAP_DATASET_JOB: &str = "MapDatasetJob";
}

/// Queue and topic names used between services
pub mod bus_names {
    /// Calculation runs consumed by the runner
    pub const CALCULATE_ALLOCATIONS_QUEUE: &str = "calc-events-instruct-generate-allocations";
    /// Dataset mapping consumed by the runner
    pub const MAP_DATASET_QUEUE: &str = "dataset-events-map-dataset";
    /// Job creation requests consumed by the orchestrator
    pub const CREATE_JOB_QUEUE: &str = "jobs-create-job";
    /// Job status notifications
    pub const JOB_NOTIFICATIONS_TOPIC: &str = "job-notifications";
}

/// Where a job's message is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Queue(String),
    Topic(String),
}

impl JobDefinition {
    /// Resolves the delivery destination, preferring the queue.
    pub fn destination(&self) -> Option<Destination> {
        let non_empty = |s: &Option<String>| s.as_ref().filter(|v| !v.trim().is_empty()).cloned();

        non_empty(&self.message_bus_queue)
            .map(Destination::Queue)
            .or_else(|| non_empty(&self.message_bus_topic).map(Destination::Topic))
    }
}

/// Serializes a [`Duration`] as whole seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
