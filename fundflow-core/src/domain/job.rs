//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A tracked unit of asynchronous work
///
/// Structure shared between orchestrator (persists and mutates) and runner
/// (reports progress against it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub job_definition_id: String,
    pub specification_id: Option<String>,
    pub parent_job_id: Option<Uuid>,
    pub superseded_by_job_id: Option<Uuid>,
    pub trigger: Trigger,
    pub running_status: RunningStatus,
    pub completion_status: Option<CompletionStatus>,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub item_count: Option<i32>,
    pub outcome: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    pub message_body: Option<String>,
    pub correlation_id: Option<String>,
    pub invoker_user_id: Option<String>,
    pub invoker_user_display_name: Option<String>,
}

impl Job {
    pub fn is_completed(&self) -> bool {
        self.running_status == RunningStatus::Completed
    }

    /// Moves the job into its terminal state.
    ///
    /// Completion happens once: returns `false` and leaves the job untouched
    /// when it is already completed.
    pub fn complete(
        &mut self,
        status: CompletionStatus,
        outcome: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.is_completed() {
            return false;
        }

        self.running_status = RunningStatus::Completed;
        self.completion_status = Some(status);
        self.completed = Some(at);
        self.last_updated = at;
        if outcome.is_some() {
            self.outcome = outcome;
        }
        true
    }

    /// Marks the job as picked up by a worker.
    ///
    /// Returns `false` when nothing changed (already in progress or completed).
    pub fn start(&mut self, at: DateTime<Utc>) -> bool {
        if self.running_status != RunningStatus::Queued {
            return false;
        }

        self.running_status = RunningStatus::InProgress;
        self.last_updated = at;
        true
    }
}

/// Entity and reason that caused a job to be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub message: String,
}

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunningStatus {
    Queued,
    InProgress,
    Completed,
}

/// How a completed job ended
///
/// The declaration order is the aggregation priority used when a parent
/// completes from its children: the first status present among the
/// children wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    TimedOut,
    Cancelled,
    Superseded,
    Failed,
    Succeeded,
}

impl CompletionStatus {
    /// Statuses in aggregation priority order
    pub const PRIORITY: [CompletionStatus; 5] = [
        CompletionStatus::TimedOut,
        CompletionStatus::Cancelled,
        CompletionStatus::Superseded,
        CompletionStatus::Failed,
        CompletionStatus::Succeeded,
    ];

    pub fn from_success(succeeded: bool) -> Self {
        if succeeded {
            CompletionStatus::Succeeded
        } else {
            CompletionStatus::Failed
        }
    }
}

impl std::fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunningStatus::Queued => write!(f, "Queued"),
            RunningStatus::InProgress => write!(f, "InProgress"),
            RunningStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionStatus::TimedOut => write!(f, "TimedOut"),
            CompletionStatus::Cancelled => write!(f, "Cancelled"),
            CompletionStatus::Superseded => write!(f, "Superseded"),
            CompletionStatus::Failed => write!(f, "Failed"),
            CompletionStatus::Succeeded => write!(f, "Succeeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued_job() -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            job_definition_id: "CreateInstructAllocationJob".to_string(),
            specification_id: Some("spec-1".to_string()),
            parent_job_id: None,
            superseded_by_job_id: None,
            trigger: Trigger {
                entity_id: Some("spec-1".to_string()),
                entity_type: Some("Specification".to_string()),
                message: "test".to_string(),
            },
            running_status: RunningStatus::Queued,
            completion_status: None,
            created: now,
            completed: None,
            last_updated: now,
            item_count: None,
            outcome: None,
            properties: HashMap::new(),
            message_body: None,
            correlation_id: None,
            invoker_user_id: None,
            invoker_user_display_name: None,
        }
    }

    #[test]
    fn test_complete_sets_status_once() {
        let mut job = queued_job();
        let at = Utc::now();

        assert!(job.complete(CompletionStatus::Failed, Some("boom".to_string()), at));
        assert_eq!(job.running_status, RunningStatus::Completed);
        assert_eq!(job.completion_status, Some(CompletionStatus::Failed));
        assert_eq!(job.completed, Some(at));

        assert!(!job.complete(CompletionStatus::Succeeded, None, Utc::now()));
        assert_eq!(job.completion_status, Some(CompletionStatus::Failed));
        assert_eq!(job.outcome.as_deref(), Some("boom"));
    }

    #[test]
    fn test_start_only_from_queued() {
        let mut job = queued_job();
        assert!(job.start(Utc::now()));
        assert_eq!(job.running_status, RunningStatus::InProgress);
        assert!(!job.start(Utc::now()));

        job.complete(CompletionStatus::Succeeded, None, Utc::now());
        assert!(!job.start(Utc::now()));
        assert_eq!(job.running_status, RunningStatus::Completed);
    }

    #[test]
    fn test_priority_matches_declaration_order() {
        let mut sorted = CompletionStatus::PRIORITY;
        sorted.sort_by_key(|s| *s as u8);
        assert_eq!(sorted, CompletionStatus::PRIORITY);
    }
}
