//! Timeout sweep

use chrono::{DateTime, TimeDelta, Utc};
use fundflow_core::domain::job::{CompletionStatus, Job};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::JobError;
use super::job::JobService;

impl JobService {
    /// Times out every job that has outlived its definition's timeout.
    ///
    /// Returns the number of jobs moved to TimedOut.
    pub async fn check_and_process_timed_out_jobs(&self) -> Result<usize, JobError> {
        self.check_and_process_timed_out_jobs_at(Utc::now()).await
    }

    /// Sweep against an explicit clock
    pub async fn check_and_process_timed_out_jobs_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, JobError> {
        let jobs = self.store.get_non_completed_jobs().await.map_err(|err| {
            error!("Failed to retrieve non-completed jobs: {}", err);
            JobError::Store(err)
        })?;

        if jobs.is_empty() {
            debug!("No running jobs to check for timeout");
            return Ok(0);
        }

        let definitions = self.load_definitions().await?;
        let mut timed_out = 0;

        for job in jobs {
            let Some(definition) = definitions.get(&job.job_definition_id) else {
                error!(
                    job_id = %job.id,
                    "Failed to find job definition '{}', skipping timeout check",
                    job.job_definition_id
                );
                continue;
            };

            if !has_expired(&job, definition.timeout, now) {
                continue;
            }

            if self.timeout_job(job, definition.timeout, now).await {
                timed_out += 1;
            }
        }

        if timed_out > 0 {
            info!("Timed out {} job(s)", timed_out);
        }

        Ok(timed_out)
    }

    /// Completes `job` as TimedOut. A failed update is logged.
    pub async fn timeout_job(&self, mut job: Job, timeout: Duration, at: DateTime<Utc>) -> bool {
        let outcome = format!("Job timed out after {} seconds", timeout.as_secs());
        let job_id = job.id;

        let done = self
            .complete_job(&mut job, CompletionStatus::TimedOut, Some(outcome), at)
            .await;

        if done {
            warn!(job_id = %job_id, "Job timed out");
        }

        done
    }
}

/// `now` is strictly past `created + timeout`
fn has_expired(job: &Job, timeout: Duration, now: DateTime<Utc>) -> bool {
    TimeDelta::from_std(timeout)
        .ok()
        .and_then(|timeout| job.created.checked_add_signed(timeout))
        .map(|deadline| now > deadline)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{Harness, caller, create_model, definition};
    use fundflow_core::domain::job::RunningStatus;
    use fundflow_core::dto::log::JobLogUpdateModel;

    const CALC: &str = "calc-allocate";

    fn harness() -> Harness {
        Harness::new(vec![definition(CALC, Duration::from_secs(30 * 60), true)])
    }

    #[tokio::test]
    async fn test_sweep_times_out_only_expired_jobs() {
        let mut h = harness();
        let job = h
            .service
            .create_jobs(vec![create_model(CALC, "S1")], &caller())
            .await
            .unwrap()
            .remove(0);
        h.drain_notifications();

        let within = job.created + TimeDelta::minutes(29);
        assert_eq!(
            h.service.check_and_process_timed_out_jobs_at(within).await.unwrap(),
            0
        );
        assert_eq!(h.job(job.id).await.running_status, RunningStatus::Queued);

        let after = job.created + TimeDelta::minutes(31);
        assert_eq!(
            h.service.check_and_process_timed_out_jobs_at(after).await.unwrap(),
            1
        );

        let stored = h.job(job.id).await;
        assert_eq!(stored.completion_status, Some(CompletionStatus::TimedOut));
        assert_eq!(stored.completed, Some(after));
        assert_eq!(h.drain_notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_jobs_without_definition_are_skipped() {
        let h = harness();
        let original = h
            .service
            .create_jobs(vec![create_model(CALC, "S1")], &caller())
            .await
            .unwrap()
            .remove(0);
        let mut orphan = original.clone();
        orphan.id = uuid::Uuid::new_v4();
        orphan.job_definition_id = "retired-definition".to_string();
        h.insert(orphan.clone()).await;

        let later = orphan.created + TimeDelta::hours(2);
        let timed_out = h
            .service
            .check_and_process_timed_out_jobs_at(later)
            .await
            .unwrap();

        assert_eq!(timed_out, 1);
        assert_eq!(h.job(orphan.id).await.running_status, RunningStatus::Queued);
        assert_eq!(
            h.job(original.id).await.completion_status,
            Some(CompletionStatus::TimedOut)
        );
    }

    #[tokio::test]
    async fn test_superseded_job_then_timeout_of_successor() {
        let h = harness();

        let j1 = h
            .service
            .create_jobs(vec![create_model(CALC, "S1")], &caller())
            .await
            .unwrap()
            .remove(0);
        h.service
            .add_job_log(j1.id, JobLogUpdateModel::in_progress())
            .await
            .unwrap();

        let j2 = h
            .service
            .create_jobs(vec![create_model(CALC, "S1")], &caller())
            .await
            .unwrap()
            .remove(0);

        let j1 = h.job(j1.id).await;
        assert_eq!(j1.completion_status, Some(CompletionStatus::Superseded));
        assert_eq!(j1.superseded_by_job_id, Some(j2.id));
        assert_eq!(h.job(j2.id).await.running_status, RunningStatus::Queued);

        let sweep_at = j2.created + TimeDelta::minutes(31);
        h.service
            .check_and_process_timed_out_jobs_at(sweep_at)
            .await
            .unwrap();

        let j2 = h.job(j2.id).await;
        assert_eq!(j2.running_status, RunningStatus::Completed);
        assert_eq!(j2.completion_status, Some(CompletionStatus::TimedOut));
        assert_eq!(
            h.job(j1.id).await.completion_status,
            Some(CompletionStatus::Superseded)
        );
    }

    #[tokio::test]
    async fn test_sweep_does_not_override_concurrent_success() {
        let mut h = harness();
        let job = h
            .service
            .create_jobs(vec![create_model(CALC, "S1")], &caller())
            .await
            .unwrap()
            .remove(0);
        h.drain_notifications();

        let mut succeeded = job.clone();
        succeeded.complete(CompletionStatus::Succeeded, None, Utc::now());
        h.store.interleave_write(succeeded);

        let after = job.created + TimeDelta::minutes(31);
        assert_eq!(
            h.service.check_and_process_timed_out_jobs_at(after).await.unwrap(),
            0
        );
        assert_eq!(
            h.job(job.id).await.completion_status,
            Some(CompletionStatus::Succeeded)
        );
        assert!(h.drain_notifications().is_empty());
    }

    #[test]
    fn test_has_expired_is_strict() {
        let created = Utc::now();
        let job = Job {
            created,
            ..crate::service::testing::job_fixture()
        };

        let timeout = Duration::from_secs(60);
        assert!(!has_expired(&job, timeout, created + TimeDelta::seconds(60)));
        assert!(has_expired(&job, timeout, created + TimeDelta::seconds(61)));
        assert!(!has_expired(&job, Duration::MAX, created + TimeDelta::days(365)));
    }
}
