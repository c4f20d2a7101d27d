//! Job Repository
//!
//! Storage contract for jobs and their logs, plus the in-memory store used
//! by single-process deployments and tests.

use async_trait::async_trait;
use fundflow_core::domain::job::{Job, RunningStatus};
use fundflow_core::domain::log::JobLog;
use fundflow_core::error::StoreError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence for [`Job`] and [`JobLog`] records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new job and returns the stored record
    async fn create_job(&self, job: &Job) -> Result<Job, StoreError>;

    /// Replaces a stored job with `job` when the stored running status is
    /// still `expected`.
    ///
    /// Fails with [`StoreError::Conflict`] when another writer moved the job
    /// on since it was read.
    async fn update_job(&self, job: &Job, expected: RunningStatus) -> Result<(), StoreError>;

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    async fn get_child_jobs_for_parent(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError>;

    /// Jobs of one definition and specification that have not completed
    async fn get_running_jobs_for_specification_and_job_definition_id(
        &self,
        specification_id: &str,
        job_definition_id: &str,
    ) -> Result<Vec<Job>, StoreError>;

    /// Every job that has not completed, oldest first
    async fn get_non_completed_jobs(&self) -> Result<Vec<Job>, StoreError>;

    async fn create_job_log(&self, log: &JobLog) -> Result<(), StoreError>;

    /// Logs for a job in the order they were written
    async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLog>, StoreError>;
}

/// Job store held entirely in memory
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    logs: RwLock<Vec<JobLog>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &Job) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }

        jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn update_job(&self, job: &Job, expected: RunningStatus) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;

        match jobs.get_mut(&job.id) {
            Some(stored) if stored.running_status != expected => Err(StoreError::Conflict(format!(
                "job {} is {}, expected {}",
                job.id, stored.running_status, expected
            ))),
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("job {}", job.id))),
        }
    }

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn get_child_jobs_for_parent(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut children: Vec<Job> = jobs
            .values()
            .filter(|j| j.parent_job_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|j| j.created);
        Ok(children)
    }

    async fn get_running_jobs_for_specification_and_job_definition_id(
        &self,
        specification_id: &str,
        job_definition_id: &str,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut running: Vec<Job> = jobs
            .values()
            .filter(|j| {
                j.running_status != RunningStatus::Completed
                    && j.job_definition_id == job_definition_id
                    && j.specification_id.as_deref() == Some(specification_id)
            })
            .cloned()
            .collect();
        running.sort_by_key(|j| j.created);
        Ok(running)
    }

    async fn get_non_completed_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut pending: Vec<Job> = jobs
            .values()
            .filter(|j| j.running_status != RunningStatus::Completed)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created);
        Ok(pending)
    }

    async fn create_job_log(&self, log: &JobLog) -> Result<(), StoreError> {
        if !self.jobs.read().await.contains_key(&log.job_id) {
            return Err(StoreError::NotFound(format!("job {}", log.job_id)));
        }

        self.logs.write().await.push(log.clone());
        Ok(())
    }

    async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLog>, StoreError> {
        let logs = self.logs.read().await;
        Ok(logs.iter().filter(|l| l.job_id == job_id).cloned().collect())
    }
}
