//! Resilient Repository Wrappers
//!
//! Decorators that run every call to the job store and notification channel
//! through a [`ResiliencePolicy`]. Services depend on the traits only and
//! never see retries.

use async_trait::async_trait;
use fundflow_core::domain::job::{Job, RunningStatus};
use fundflow_core::domain::log::JobLog;
use fundflow_core::domain::notification::JobNotification;
use fundflow_core::error::{BusError, StoreError};
use fundflow_core::resilience::ResiliencePolicy;
use std::sync::Arc;
use uuid::Uuid;

use super::job::JobStore;
use super::notification::NotificationChannel;

pub struct ResilientJobStore {
    inner: Arc<dyn JobStore>,
    policy: ResiliencePolicy,
}

impl ResilientJobStore {
    pub fn new(inner: Arc<dyn JobStore>, policy: ResiliencePolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl JobStore for ResilientJobStore {
    async fn create_job(&self, job: &Job) -> Result<Job, StoreError> {
        self.policy.execute(|| self.inner.create_job(job)).await
    }

    async fn update_job(&self, job: &Job, expected: RunningStatus) -> Result<(), StoreError> {
        self.policy
            .execute(|| self.inner.update_job(job, expected))
            .await
    }

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.policy.execute(|| self.inner.get_job_by_id(id)).await
    }

    async fn get_child_jobs_for_parent(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError> {
        self.policy
            .execute(|| self.inner.get_child_jobs_for_parent(parent_id))
            .await
    }

    async fn get_running_jobs_for_specification_and_job_definition_id(
        &self,
        specification_id: &str,
        job_definition_id: &str,
    ) -> Result<Vec<Job>, StoreError> {
        self.policy
            .execute(|| {
                self.inner
                    .get_running_jobs_for_specification_and_job_definition_id(
                        specification_id,
                        job_definition_id,
                    )
            })
            .await
    }

    async fn get_non_completed_jobs(&self) -> Result<Vec<Job>, StoreError> {
        self.policy
            .execute(|| self.inner.get_non_completed_jobs())
            .await
    }

    async fn create_job_log(&self, log: &JobLog) -> Result<(), StoreError> {
        self.policy.execute(|| self.inner.create_job_log(log)).await
    }

    async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLog>, StoreError> {
        self.policy.execute(|| self.inner.get_job_logs(job_id)).await
    }
}

pub struct ResilientNotificationChannel {
    inner: Arc<dyn NotificationChannel>,
    policy: ResiliencePolicy,
}

impl ResilientNotificationChannel {
    pub fn new(inner: Arc<dyn NotificationChannel>, policy: ResiliencePolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl NotificationChannel for ResilientNotificationChannel {
    async fn send_notification(&self, notification: &JobNotification) -> Result<(), BusError> {
        self.policy
            .execute(|| self.inner.send_notification(notification))
            .await
    }
}
