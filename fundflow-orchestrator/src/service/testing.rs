//! Shared fixtures for service tests

use async_trait::async_trait;
use fundflow_core::domain::definition::{JobDefinition, bus_names};
use fundflow_core::domain::job::{Job, RunningStatus, Trigger};
use fundflow_core::domain::log::JobLog;
use fundflow_core::domain::notification::JobNotification;
use fundflow_core::dto::job::{CallerContext, JobCreateModel};
use fundflow_core::error::StoreError;
use fundflow_core::messaging::{InMemoryBus, Message};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::repository::{
    InMemoryJobStore, JobStore, StaticJobDefinitionRegistry, TopicNotificationChannel,
};
use crate::service::JobService;

/// In-memory store that counts job updates and can be told to fail them
#[derive(Default)]
pub struct CountingJobStore {
    inner: InMemoryJobStore,
    pub updates: AtomicUsize,
    pub fail_updates: AtomicBool,
    interleaved: Mutex<Option<Job>>,
}

impl CountingJobStore {
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Writes `job` as another task would, right before the next update
    /// lands, so the service's update races against it.
    pub fn interleave_write(&self, job: Job) {
        *self.interleaved.lock().unwrap() = Some(job);
    }
}

#[async_trait]
impl JobStore for CountingJobStore {
    async fn create_job(&self, job: &Job) -> Result<Job, StoreError> {
        self.inner.create_job(job).await
    }

    async fn update_job(&self, job: &Job, expected: RunningStatus) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update rejected".to_string()));
        }

        let interleaved = self.interleaved.lock().unwrap().take();
        if let Some(other) = interleaved {
            let current = self.inner.get_job_by_id(other.id).await?.unwrap();
            self.inner.update_job(&other, current.running_status).await?;
        }

        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_job(job, expected).await
    }

    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.inner.get_job_by_id(id).await
    }

    async fn get_child_jobs_for_parent(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError> {
        self.inner.get_child_jobs_for_parent(parent_id).await
    }

    async fn get_running_jobs_for_specification_and_job_definition_id(
        &self,
        specification_id: &str,
        job_definition_id: &str,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner
            .get_running_jobs_for_specification_and_job_definition_id(
                specification_id,
                job_definition_id,
            )
            .await
    }

    async fn get_non_completed_jobs(&self) -> Result<Vec<Job>, StoreError> {
        self.inner.get_non_completed_jobs().await
    }

    async fn create_job_log(&self, log: &JobLog) -> Result<(), StoreError> {
        self.inner.create_job_log(log).await
    }

    async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLog>, StoreError> {
        self.inner.get_job_logs(job_id).await
    }
}

pub struct Harness {
    pub service: Arc<JobService>,
    pub store: Arc<CountingJobStore>,
    pub bus: InMemoryBus,
    notifications: UnboundedReceiver<Message>,
}

impl Harness {
    pub fn new(definitions: Vec<JobDefinition>) -> Self {
        let bus = InMemoryBus::new();
        let notifications = bus
            .take_topic_receiver(bus_names::JOB_NOTIFICATIONS_TOPIC)
            .unwrap();
        let store = Arc::new(CountingJobStore::default());

        let service = JobService::new(
            store.clone(),
            Arc::new(StaticJobDefinitionRegistry::new(definitions)),
            Arc::new(TopicNotificationChannel::new(
                Arc::new(bus.clone()),
                bus_names::JOB_NOTIFICATIONS_TOPIC,
            )),
            Arc::new(bus.clone()),
        );

        Self {
            service: Arc::new(service),
            store,
            bus,
            notifications,
        }
    }

    /// Notifications published since the last call
    pub fn drain_notifications(&mut self) -> Vec<JobNotification> {
        let mut drained = Vec::new();
        while let Ok(message) = self.notifications.try_recv() {
            drained.push(message.body_as().unwrap());
        }
        drained
    }

    /// Persists a job directly, bypassing creation side effects
    pub async fn insert(&self, job: Job) -> Job {
        self.store.create_job(&job).await.unwrap()
    }

    pub async fn job(&self, id: Uuid) -> Job {
        self.store.get_job_by_id(id).await.unwrap().unwrap()
    }
}

pub fn definition(id: &str, timeout: Duration, supersede: bool) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        description: None,
        timeout,
        message_bus_queue: Some(format!("{}-queue", id)),
        message_bus_topic: None,
        supersede_existing_running_job_on_enqueue: supersede,
        require_specification_id: true,
        require_entity_id: false,
        require_message_body: false,
        require_message_properties: Vec::new(),
    }
}

pub fn create_model(definition_id: &str, specification_id: &str) -> JobCreateModel {
    JobCreateModel {
        job_definition_id: definition_id.to_string(),
        specification_id: Some(specification_id.to_string()),
        trigger: Some(Trigger {
            entity_id: Some(specification_id.to_string()),
            entity_type: Some("Specification".to_string()),
            message: "Requested by test".to_string(),
        }),
        ..JobCreateModel::default()
    }
}

pub fn caller() -> CallerContext {
    CallerContext::new("user-1", "Test User")
}

/// A queued job that is not stored anywhere
pub fn job_fixture() -> Job {
    let now = chrono::Utc::now();
    Job {
        id: Uuid::new_v4(),
        job_definition_id: "calc-allocate".to_string(),
        specification_id: Some("S1".to_string()),
        parent_job_id: None,
        superseded_by_job_id: None,
        trigger: Trigger {
            entity_id: Some("S1".to_string()),
            entity_type: Some("Specification".to_string()),
            message: "fixture".to_string(),
        },
        running_status: RunningStatus::Queued,
        completion_status: None,
        created: now,
        completed: None,
        last_updated: now,
        item_count: None,
        outcome: None,
        properties: Default::default(),
        message_body: None,
        correlation_id: None,
        invoker_user_id: None,
        invoker_user_display_name: None,
    }
}
