//! Parent job completion
//!
//! When the last child of a parent completes, the parent completes too,
//! taking the most severe status found among its children.

use chrono::Utc;
use fundflow_core::domain::job::{CompletionStatus, Job};
use fundflow_core::domain::notification::JobNotification;
use tracing::{debug, info, warn};

use super::error::JobError;
use super::job::JobService;

/// Status a parent takes from its completed children
///
/// The first status in [`CompletionStatus::PRIORITY`] held by any child
/// wins. An empty set counts as success.
pub fn aggregate_completion_status(children: &[Job]) -> CompletionStatus {
    CompletionStatus::PRIORITY
        .into_iter()
        .find(|status| {
            children
                .iter()
                .any(|child| child.completion_status == Some(*status))
        })
        .unwrap_or(CompletionStatus::Succeeded)
}

impl JobService {
    /// Handles a job notification, completing the job's parent when all of
    /// its children have completed.
    pub async fn process_job_completion(
        &self,
        notification: &JobNotification,
    ) -> Result<(), JobError> {
        if !notification.is_completed() {
            return Ok(());
        }

        let Some(parent_id) = notification.parent_job_id else {
            debug!(job_id = %notification.job_id, "Completed job has no parent");
            return Ok(());
        };

        let Some(mut parent) = self.store.get_job_by_id(parent_id).await? else {
            warn!(
                job_id = %notification.job_id,
                "Parent job {} not found",
                parent_id
            );
            return Ok(());
        };

        if parent.is_completed() {
            debug!(job_id = %parent_id, "Parent job already completed");
            return Ok(());
        }

        let children = self.store.get_child_jobs_for_parent(parent_id).await?;
        let running = children.iter().filter(|c| !c.is_completed()).count();

        if running > 0 {
            info!(
                job_id = %parent_id,
                "Parent job still has {} running child job(s)",
                running
            );
            return Ok(());
        }

        let status = aggregate_completion_status(&children);
        let outcome = format!("All {} child job(s) completed", children.len());

        if self
            .complete_job(&mut parent, status, Some(outcome), Utc::now())
            .await
        {
            info!(job_id = %parent_id, "Parent job completed as {}", status);
        }

        Ok(())
    }
}
