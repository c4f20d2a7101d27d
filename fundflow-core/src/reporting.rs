//! Progress reporting from workers back to job management

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::log::JobLog;
use crate::dto::log::JobLogUpdateModel;

/// Accepts JobLog updates for a job
///
/// Implemented by the job management service; workers hold it as a trait
/// object so they never depend on how jobs are stored.
#[async_trait]
pub trait JobReporter: Send + Sync {
    async fn report(&self, job_id: Uuid, update: JobLogUpdateModel) -> anyhow::Result<JobLog>;
}
