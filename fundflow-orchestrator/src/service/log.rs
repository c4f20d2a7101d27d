//! Log Service
//!
//! Applies worker progress and completion logs to jobs.

use async_trait::async_trait;
use chrono::Utc;
use fundflow_core::domain::job::CompletionStatus;
use fundflow_core::domain::log::JobLog;
use fundflow_core::dto::log::JobLogUpdateModel;
use fundflow_core::reporting::JobReporter;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::JobError;
use super::job::JobService;

impl JobService {
    /// Records a log against a job and applies its status change.
    ///
    /// A terminal log completes the job unless it already completed, in
    /// which case only the log is stored. An in-progress ping moves a queued
    /// job to InProgress; further pings leave the job untouched. A status
    /// written by another task in the meantime is re-read, never overwritten.
    pub async fn add_job_log(
        &self,
        job_id: Uuid,
        update: JobLogUpdateModel,
    ) -> Result<JobLog, JobError> {
        let job = self.get_job(job_id).await?;
        let now = Utc::now();
        let completion = update
            .completed_successfully
            .map(CompletionStatus::from_success);

        let (job, changed) = self
            .transition_job(job, |job| match completion {
                Some(status) => job.complete(status, update.outcome.clone(), now),
                None => job.start(now),
            })
            .await
            .map_err(|err| {
                error!(job_id = %job_id, "Failed to update job: {}", err);
                JobError::Internal(format!("Failed to update job {}", job_id))
            })?;

        match completion {
            Some(status) if changed => info!(job_id = %job_id, "Job completed as {}", status),
            Some(status) => warn!(
                job_id = %job_id,
                "Job already completed as {:?}, ignoring {} log",
                job.completion_status,
                status
            ),
            None if changed => debug!(job_id = %job_id, "Job in progress"),
            None => {}
        }

        let log = JobLog {
            id: Uuid::new_v4(),
            job_id,
            items_processed: update.items_processed,
            items_succeeded: update.items_succeeded,
            items_failed: update.items_failed,
            outcome: update.outcome,
            completed_successfully: update.completed_successfully,
            timestamp: now,
        };

        self.store.create_job_log(&log).await.map_err(|err| {
            error!(job_id = %job_id, "Failed to create job log: {}", err);
            JobError::Store(err)
        })?;

        self.notify(&job, Some(&log)).await;

        Ok(log)
    }

    /// Logs of a job, oldest first
    pub async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLog>, JobError> {
        self.get_job(job_id).await?;
        Ok(self.store.get_job_logs(job_id).await?)
    }
}

#[async_trait]
impl JobReporter for JobService {
    async fn report(&self, job_id: Uuid, update: JobLogUpdateModel) -> anyhow::Result<JobLog> {
        Ok(self.add_job_log(job_id, update).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::JobStore;
    use crate::service::testing::{Harness, caller, create_model, definition};
    use fundflow_core::domain::job::{Job, RunningStatus};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn queued_job(h: &Harness) -> Job {
        h.service
            .create_jobs(vec![create_model("MapDatasetJob", "S1")], &caller())
            .await
            .unwrap()
            .remove(0)
    }

    fn harness() -> Harness {
        Harness::new(vec![definition(
            "MapDatasetJob",
            Duration::from_secs(3600),
            false,
        )])
    }

    #[tokio::test]
    async fn test_repeated_pings_do_not_resave_job() {
        let h = harness();
        let job = queued_job(&h).await;

        h.service
            .add_job_log(job.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap();
        assert_eq!(h.store.update_count(), 1);
        assert_eq!(h.job(job.id).await.running_status, RunningStatus::InProgress);

        h.service
            .add_job_log(job.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap();
        assert_eq!(h.store.update_count(), 1);
        assert_eq!(h.store.get_job_logs(job.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_log_completes_job_with_outcome() {
        let mut h = harness();
        let job = queued_job(&h).await;
        h.drain_notifications();

        let log = h
            .service
            .add_job_log(
                job.id,
                JobLogUpdateModel::completed(false, "Provider data missing").with_counts(10, 7, 3),
            )
            .await
            .unwrap();
        assert_eq!(log.items_failed, Some(3));

        let stored = h.job(job.id).await;
        assert_eq!(stored.running_status, RunningStatus::Completed);
        assert_eq!(stored.completion_status, Some(CompletionStatus::Failed));
        assert_eq!(stored.outcome.as_deref(), Some("Provider data missing"));
        assert!(stored.completed.is_some());

        let notifications = h.drain_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].overall_items_processed, Some(10));
        assert_eq!(notifications[0].overall_items_failed, Some(3));
    }

    #[tokio::test]
    async fn test_late_terminal_log_keeps_first_status() {
        let h = harness();
        let job = queued_job(&h).await;
        h.service.cancel_job(job.id).await.unwrap();
        let updates = h.store.update_count();

        h.service
            .add_job_log(job.id, JobLogUpdateModel::completed(true, "done"))
            .await
            .unwrap();

        let stored = h.job(job.id).await;
        assert_eq!(stored.completion_status, Some(CompletionStatus::Cancelled));
        assert_eq!(stored.outcome.as_deref(), Some("Job cancelled"));
        assert_eq!(h.store.update_count(), updates);
        assert_eq!(h.service.get_job_logs(job.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ping_racing_a_timeout_leaves_job_timed_out() {
        let mut h = harness();
        let job = queued_job(&h).await;
        h.drain_notifications();

        let mut timed_out = job.clone();
        timed_out.complete(
            CompletionStatus::TimedOut,
            Some("Job timed out after 3600 seconds".to_string()),
            Utc::now(),
        );
        h.store.interleave_write(timed_out);

        h.service
            .add_job_log(job.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap();

        let stored = h.job(job.id).await;
        assert_eq!(stored.running_status, RunningStatus::Completed);
        assert_eq!(stored.completion_status, Some(CompletionStatus::TimedOut));
        assert_eq!(h.store.get_job_logs(job.id).await.unwrap().len(), 1);

        let notifications = h.drain_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].completion_status,
            Some(CompletionStatus::TimedOut)
        );
    }

    #[tokio::test]
    async fn test_terminal_log_reapplies_after_concurrent_start() {
        let h = harness();
        let job = queued_job(&h).await;

        let mut started = job.clone();
        started.start(Utc::now());
        h.store.interleave_write(started);

        h.service
            .add_job_log(job.id, JobLogUpdateModel::completed(true, "done"))
            .await
            .unwrap();

        let stored = h.job(job.id).await;
        assert_eq!(stored.running_status, RunningStatus::Completed);
        assert_eq!(stored.completion_status, Some(CompletionStatus::Succeeded));
        assert_eq!(stored.outcome.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let h = harness();
        let err = h
            .service
            .add_job_log(Uuid::new_v4(), JobLogUpdateModel::in_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));

        let err = h.service.get_job_logs(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_job_update_is_internal_and_writes_no_log() {
        let h = harness();
        let job = queued_job(&h).await;
        h.store.fail_updates.store(true, Ordering::SeqCst);

        let err = h
            .service
            .add_job_log(job.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Internal(_)));
        assert!(h.store.get_job_logs(job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reporter_forwards_to_add_job_log() {
        let h = harness();
        let job = queued_job(&h).await;
        let reporter: &dyn JobReporter = h.service.as_ref();

        reporter
            .report(job.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap();
        assert_eq!(h.job(job.id).await.running_status, RunningStatus::InProgress);
        assert!(reporter.report(Uuid::new_v4(), JobLogUpdateModel::in_progress()).await.is_err());
    }
}
