//! Job notification projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::job::{CompletionStatus, Job, RunningStatus, Trigger};
use crate::domain::log::JobLog;

/// Snapshot of a job's state, broadcast after every relevant change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNotification {
    pub job_id: Uuid,
    pub job_type: String,
    pub running_status: RunningStatus,
    pub completion_status: Option<CompletionStatus>,
    pub specification_id: Option<String>,
    pub parent_job_id: Option<Uuid>,
    pub superseded_by_job_id: Option<Uuid>,
    pub trigger: Trigger,
    pub invoker_user_id: Option<String>,
    pub invoker_user_display_name: Option<String>,
    pub item_count: Option<i32>,
    pub outcome: Option<String>,
    pub overall_items_processed: Option<i32>,
    pub overall_items_succeeded: Option<i32>,
    pub overall_items_failed: Option<i32>,
    pub status_date_time: DateTime<Utc>,
}

impl JobNotification {
    /// Projects a job, and optionally the log that caused the change.
    pub fn from_job(job: &Job, latest_log: Option<&JobLog>) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_definition_id.clone(),
            running_status: job.running_status,
            completion_status: job.completion_status,
            specification_id: job.specification_id.clone(),
            parent_job_id: job.parent_job_id,
            superseded_by_job_id: job.superseded_by_job_id,
            trigger: job.trigger.clone(),
            invoker_user_id: job.invoker_user_id.clone(),
            invoker_user_display_name: job.invoker_user_display_name.clone(),
            item_count: job.item_count,
            outcome: job.outcome.clone(),
            overall_items_processed: latest_log.and_then(|l| l.items_processed),
            overall_items_succeeded: latest_log.and_then(|l| l.items_succeeded),
            overall_items_failed: latest_log.and_then(|l| l.items_failed),
            status_date_time: latest_log.map(|l| l.timestamp).unwrap_or(job.last_updated),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.running_status == RunningStatus::Completed
    }

    /// Properties subscribers can filter the status topic on
    pub fn partition_properties(&self) -> HashMap<String, String> {
        let mut props = HashMap::new();
        props.insert("jobId".to_string(), self.job_id.to_string());
        props.insert("jobType".to_string(), self.job_type.clone());

        if let Some(spec) = &self.specification_id {
            props.insert("specificationId".to_string(), spec.clone());
        }
        if let Some(entity) = &self.trigger.entity_id {
            props.insert("entityId".to_string(), entity.clone());
        }
        if let Some(parent) = self.parent_job_id {
            props.insert("parentJobId".to_string(), parent.to_string());
        }

        props
    }
}
