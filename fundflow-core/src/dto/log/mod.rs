//! Job log DTOs for inter-service communication

use serde::{Deserialize, Serialize};

/// Progress or completion update posted by a worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogUpdateModel {
    #[serde(default)]
    pub items_processed: Option<i32>,
    #[serde(default)]
    pub items_succeeded: Option<i32>,
    #[serde(default)]
    pub items_failed: Option<i32>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub completed_successfully: Option<bool>,
}

impl JobLogUpdateModel {
    /// In-progress ping without counters
    pub fn in_progress() -> Self {
        Self::default()
    }

    pub fn completed(succeeded: bool, outcome: impl Into<String>) -> Self {
        Self {
            completed_successfully: Some(succeeded),
            outcome: Some(outcome.into()),
            ..Self::default()
        }
    }

    pub fn with_counts(mut self, processed: i32, succeeded: i32, failed: i32) -> Self {
        self.items_processed = Some(processed);
        self.items_succeeded = Some(succeeded);
        self.items_failed = Some(failed);
        self
    }
}
