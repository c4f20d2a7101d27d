//! Queue worker
//!
//! Consumes one queue and hands each message to a [`JobHandler`] in its own
//! task. Progress goes back to job management as JobLogs: an in-progress
//! ping before the handler runs, then a terminal log with the handler's
//! counters.

use fundflow_core::dto::log::JobLogUpdateModel;
use fundflow_core::messaging::{Message, properties};
use fundflow_core::reporting::JobReporter;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, error, info, warn};

use super::handler::JobHandler;

pub struct QueueWorker {
    queue: String,
    receiver: mpsc::UnboundedReceiver<Message>,
    handler: Arc<dyn JobHandler>,
    reporter: Arc<dyn JobReporter>,
    max_parallel_jobs: usize,
}

impl QueueWorker {
    pub fn new(
        queue: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<Message>,
        handler: Arc<dyn JobHandler>,
        reporter: Arc<dyn JobReporter>,
        max_parallel_jobs: usize,
    ) -> Self {
        Self {
            queue: queue.into(),
            receiver,
            handler,
            reporter,
            max_parallel_jobs: max_parallel_jobs.max(1),
        }
    }

    /// Consumes until `shutdown` becomes `true` or the queue closes, then
    /// waits for in-flight jobs.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = %self.queue,
            "Starting {} worker (max parallel jobs: {})",
            self.handler.name(),
            self.max_parallel_jobs
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel_jobs));

        loop {
            let message = tokio::select! {
                message = self.receiver.recv() => message,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let Some(message) = message else {
                info!(queue = %self.queue, "Queue closed");
                break;
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let handler = Arc::clone(&self.handler);
            let reporter = Arc::clone(&self.reporter);
            tokio::spawn(async move {
                process_message(handler.as_ref(), reporter.as_ref(), message).await;
                drop(permit);
            });
        }

        let in_flight = self.max_parallel_jobs - semaphore.available_permits();
        if in_flight > 0 {
            info!(queue = %self.queue, "Waiting for {} in-flight job(s)", in_flight);
        }
        let _ = semaphore.acquire_many(self.max_parallel_jobs as u32).await;

        info!(queue = %self.queue, "{} worker stopped", self.handler.name());
    }
}

/// Runs one message through `handler`, reporting progress when the message
/// carries a job id.
pub async fn process_message(
    handler: &dyn JobHandler,
    reporter: &dyn JobReporter,
    message: Message,
) {
    let job_id = message.job_id();
    let correlation_id = message.property(properties::CORRELATION_ID).map(str::to_string);

    match job_id {
        Some(job_id) => {
            if let Err(e) = reporter.report(job_id, JobLogUpdateModel::in_progress()).await {
                warn!(job_id = %job_id, "Failed to report job start: {:#}", e);
            }
        }
        None => debug!("Message has no job id, progress will not be reported"),
    }

    let started = Instant::now();
    let update = match handler.handle(&message).await {
        Ok(outcome) => {
            info!(
                job_id = ?job_id,
                correlation_id = ?correlation_id,
                "{} job succeeded in {:?}: {}",
                handler.name(),
                started.elapsed(),
                outcome.summary
            );
            JobLogUpdateModel::completed(true, outcome.summary).with_counts(
                outcome.items_processed,
                outcome.items_succeeded,
                outcome.items_failed,
            )
        }
        Err(e) => {
            error!(
                job_id = ?job_id,
                correlation_id = ?correlation_id,
                "{} job failed: {:#}",
                handler.name(),
                e
            );
            JobLogUpdateModel::completed(false, format!("{:#}", e))
        }
    };

    if let Some(job_id) = job_id {
        if let Err(e) = reporter.report(job_id, update).await {
            error!(job_id = %job_id, "Failed to report job completion: {:#}", e);
        }
    }
}
