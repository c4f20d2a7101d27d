//! Job Service
//!
//! Business logic for job creation and lifecycle transitions.

use chrono::{DateTime, Utc};
use fundflow_core::domain::definition::{Destination, JobDefinition};
use fundflow_core::domain::job::{CompletionStatus, Job, RunningStatus};
use fundflow_core::domain::log::JobLog;
use fundflow_core::domain::notification::JobNotification;
use fundflow_core::dto::job::{CallerContext, JobCreateModel};
use fundflow_core::error::StoreError;
use fundflow_core::messaging::{Message, MessageSender, properties};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::JobError;
use super::validation::validate_create_model;
use crate::repository::{JobDefinitionRegistry, JobStore, NotificationChannel};

/// Creates jobs and drives them through their lifecycle
pub struct JobService {
    pub(super) store: Arc<dyn JobStore>,
    definitions: Arc<dyn JobDefinitionRegistry>,
    notifications: Arc<dyn NotificationChannel>,
    sender: Arc<dyn MessageSender>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        definitions: Arc<dyn JobDefinitionRegistry>,
        notifications: Arc<dyn NotificationChannel>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            store,
            definitions,
            notifications,
            sender,
        }
    }

    /// Validates and creates a batch of jobs.
    ///
    /// Nothing is persisted unless every job in the batch references a known
    /// definition and passes validation. Jobs are then created in order; the
    /// first persistence or enqueue failure aborts the rest of the batch.
    pub async fn create_jobs(
        &self,
        jobs: Vec<JobCreateModel>,
        caller: &CallerContext,
    ) -> Result<Vec<Job>, JobError> {
        if jobs.is_empty() {
            warn!("Empty collection of job create models was provided");
            return Err(JobError::Validation(vec![
                "Empty collection of job create models was provided".to_string(),
            ]));
        }

        let definitions = self.load_definitions().await?;

        let mut resolved = Vec::with_capacity(jobs.len());
        for model in jobs {
            let definition = definitions
                .get(&model.job_definition_id)
                .cloned()
                .ok_or_else(|| {
                    error!(
                        job_definition_id = %model.job_definition_id,
                        "Failed to find job definition"
                    );
                    JobError::PreconditionFailed(format!(
                        "Failed to find job definition of id: {}",
                        model.job_definition_id
                    ))
                })?;

            resolved.push((with_caller_defaults(model, caller), definition));
        }

        let errors: Vec<String> = resolved
            .iter()
            .enumerate()
            .flat_map(|(index, (model, definition))| {
                validate_create_model(index, model, definition)
            })
            .collect();

        if !errors.is_empty() {
            warn!("Rejected job batch with {} validation error(s)", errors.len());
            return Err(JobError::Validation(errors));
        }

        let mut created = Vec::with_capacity(resolved.len());
        for (model, definition) in resolved {
            created.push(self.create_job(model, &definition).await?);
        }

        Ok(created)
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: Uuid) -> Result<Job, JobError> {
        self.store
            .get_job_by_id(id)
            .await?
            .ok_or(JobError::NotFound(id))
    }

    /// Cancels a job that has not completed yet.
    ///
    /// The worker running it is not interrupted; any terminal log it posts
    /// later is recorded but does not change the status.
    pub async fn cancel_job(&self, id: Uuid) -> Result<Job, JobError> {
        let job = self.get_job(id).await?;
        let now = Utc::now();

        let (job, changed) = self
            .transition_job(job, |job| {
                job.complete(
                    CompletionStatus::Cancelled,
                    Some("Job cancelled".to_string()),
                    now,
                )
            })
            .await
            .map_err(|err| {
                error!(job_id = %id, "Failed to persist cancellation: {}", err);
                JobError::Internal(format!("Failed to cancel job {}", id))
            })?;

        if !changed {
            return Err(JobError::InvalidState(format!(
                "Job {} is already completed (status: {})",
                id,
                job.completion_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| RunningStatus::Completed.to_string())
            )));
        }

        info!(job_id = %id, "Job cancelled");
        self.notify(&job, None).await;

        Ok(job)
    }

    /// Marks `job` as superseded by a newer job of the same type.
    ///
    /// Returns the job as it stands afterwards. A failed update is logged.
    pub async fn supersede_job(&self, job: Job, superseded_by: Uuid) -> Job {
        let outcome = format!("Superseded by job {}", superseded_by);
        let now = Utc::now();

        let result = self
            .transition_job(job.clone(), |job| {
                if job.is_completed() {
                    return false;
                }
                job.superseded_by_job_id = Some(superseded_by);
                job.complete(CompletionStatus::Superseded, Some(outcome.clone()), now)
            })
            .await;

        match result {
            Ok((job, true)) => {
                info!(job_id = %job.id, superseded_by = %superseded_by, "Job superseded");
                self.notify(&job, None).await;
                job
            }
            Ok((job, false)) => {
                debug!(
                    job_id = %job.id,
                    "Job already completed as {:?}, not superseding",
                    job.completion_status
                );
                job
            }
            Err(err) => {
                error!(job_id = %job.id, "Failed to persist Superseded transition: {}", err);
                job
            }
        }
    }

    async fn create_job(
        &self,
        model: JobCreateModel,
        definition: &JobDefinition,
    ) -> Result<Job, JobError> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            job_definition_id: model.job_definition_id,
            specification_id: model.specification_id,
            parent_job_id: model.parent_job_id,
            superseded_by_job_id: None,
            trigger: model.trigger.unwrap_or_default(),
            running_status: RunningStatus::Queued,
            completion_status: None,
            created: now,
            completed: None,
            last_updated: now,
            item_count: model.item_count,
            outcome: None,
            properties: model.properties,
            message_body: model.message_body,
            correlation_id: model.correlation_id,
            invoker_user_id: model.invoker_user_id,
            invoker_user_display_name: model.invoker_user_display_name,
        };

        let job = self.store.create_job(&job).await.map_err(|err| {
            error!(
                job_definition_id = %definition.id,
                correlation_id = ?job.correlation_id,
                "Failed to save new job: {}",
                err
            );
            JobError::Internal(format!("Failed to create job of type '{}'", definition.id))
        })?;

        info!(
            job_id = %job.id,
            specification_id = ?job.specification_id,
            correlation_id = ?job.correlation_id,
            "Job created of type {}",
            job.job_definition_id
        );

        if definition.supersede_existing_running_job_on_enqueue {
            self.supersede_running_jobs(&job).await;
        }

        self.enqueue(&job, definition).await?;
        self.notify(&job, None).await;

        Ok(job)
    }

    async fn supersede_running_jobs(&self, job: &Job) {
        let Some(specification_id) = job.specification_id.as_deref() else {
            return;
        };

        let running = match self
            .store
            .get_running_jobs_for_specification_and_job_definition_id(
                specification_id,
                &job.job_definition_id,
            )
            .await
        {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(
                    job_id = %job.id,
                    specification_id,
                    "Failed to look up running jobs to supersede: {}",
                    err
                );
                return;
            }
        };

        for existing in running.into_iter().filter(|j| j.id != job.id) {
            self.supersede_job(existing, job.id).await;
        }
    }

    async fn enqueue(&self, job: &Job, definition: &JobDefinition) -> Result<(), JobError> {
        let Some(destination) = definition.destination() else {
            debug!(
                job_id = %job.id,
                "Job definition {} has no destination, nothing to enqueue",
                definition.id
            );
            return Ok(());
        };

        let mut props = job.properties.clone();
        props.insert(properties::JOB_ID.to_string(), job.id.to_string());
        if let Some(specification_id) = &job.specification_id {
            props
                .entry(properties::SPECIFICATION_ID.to_string())
                .or_insert_with(|| specification_id.clone());
        }

        let message = Message::new(job.message_body.clone().unwrap_or_default(), props);

        let sent = match &destination {
            Destination::Queue(queue) => self.sender.send_to_queue(queue, message).await,
            Destination::Topic(topic) => self.sender.send_to_topic(topic, message).await,
        };

        sent.map_err(|err| {
            error!(
                job_id = %job.id,
                correlation_id = ?job.correlation_id,
                "Failed to queue job on {:?}: {}",
                destination,
                err
            );
            JobError::Internal(format!("Failed to queue job '{}'", job.id))
        })
    }

    /// Definitions keyed by id
    pub(super) async fn load_definitions(
        &self,
    ) -> Result<HashMap<String, JobDefinition>, JobError> {
        let definitions = self
            .definitions
            .get_all_job_definitions()
            .await
            .map_err(|err| {
                error!("Failed to retrieve job definitions: {}", err);
                JobError::Internal("Failed to retrieve job definitions".to_string())
            })?;

        Ok(definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), definition))
            .collect())
    }

    /// Completes, persists and notifies.
    ///
    /// Returns `false` when the job was already completed or the update
    /// failed; in both cases no notification is sent. `job` is left as it
    /// was last read from the store.
    pub(super) async fn complete_job(
        &self,
        job: &mut Job,
        status: CompletionStatus,
        outcome: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        let result = self
            .transition_job(job.clone(), |job| job.complete(status, outcome.clone(), at))
            .await;

        match result {
            Ok((stored, true)) => {
                *job = stored;
                self.notify(job, None).await;
                true
            }
            Ok((stored, false)) => {
                warn!(
                    job_id = %stored.id,
                    "Job already completed as {:?}, ignoring {} transition",
                    stored.completion_status,
                    status
                );
                *job = stored;
                false
            }
            Err(err) => {
                error!(job_id = %job.id, "Failed to persist {} transition: {}", status, err);
                false
            }
        }
    }

    /// Applies `transition` to `job` and persists it.
    ///
    /// The write only lands if the stored running status is still the one
    /// `job` was read with. On a conflict the job is read again and the
    /// transition re-applied, so a status another writer set is never
    /// overwritten. Returns the job as stored and whether this call
    /// changed it.
    pub(super) async fn transition_job<F>(
        &self,
        mut job: Job,
        mut transition: F,
    ) -> Result<(Job, bool), StoreError>
    where
        F: FnMut(&mut Job) -> bool + Send,
    {
        loop {
            let expected = job.running_status;
            if !transition(&mut job) {
                return Ok((job, false));
            }

            match self.store.update_job(&job, expected).await {
                Ok(()) => return Ok((job, true)),
                Err(StoreError::Conflict(reason)) => {
                    let id = job.id;
                    debug!(job_id = %id, "Job changed concurrently, re-reading: {}", reason);
                    job = self
                        .store
                        .get_job_by_id(id)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(format!("job {}", id)))?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Publishes the job's current state. Failures are logged only.
    pub(super) async fn notify(&self, job: &Job, log: Option<&JobLog>) {
        let notification = JobNotification::from_job(job, log);

        if let Err(err) = self.notifications.send_notification(&notification).await {
            warn!(
                job_id = %job.id,
                correlation_id = ?job.correlation_id,
                "Failed to send job notification: {}",
                err
            );
        }
    }
}

/// Fills invoker identity and correlation id from the caller
fn with_caller_defaults(mut model: JobCreateModel, caller: &CallerContext) -> JobCreateModel {
    if model.invoker_user_id.is_none() {
        model.invoker_user_id = caller.user_id.clone();
    }
    if model.invoker_user_display_name.is_none() {
        model.invoker_user_display_name = caller.user_name.clone();
    }

    let correlation_id = model
        .correlation_id
        .clone()
        .or_else(|| model.properties.get(properties::CORRELATION_ID).cloned())
        .or_else(|| caller.correlation_id.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    model
        .properties
        .entry(properties::CORRELATION_ID.to_string())
        .or_insert_with(|| correlation_id.clone());
    model.correlation_id = Some(correlation_id);

    model
}
