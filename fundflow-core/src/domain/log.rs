//! Job log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only status record posted against a job
///
/// `completed_successfully` is a tri-state: `None` for an in-progress ping,
/// `Some(true)` / `Some(false)` for the terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLog {
    pub id: Uuid,
    pub job_id: Uuid,
    pub items_processed: Option<i32>,
    pub items_succeeded: Option<i32>,
    pub items_failed: Option<i32>,
    pub outcome: Option<String>,
    pub completed_successfully: Option<bool>,
    pub timestamp: DateTime<Utc>,
}
