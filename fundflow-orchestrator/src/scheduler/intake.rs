//! Job request intake
//!
//! Turns job creation requests arriving on a queue into jobs. Other
//! services (the dataset pipeline, for one) ask for follow-up work this way
//! instead of calling the job service directly.

use fundflow_core::dto::job::{CallerContext, JobCreateModel};
use fundflow_core::messaging::{Message, properties};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::service::JobService;

pub struct JobRequestListener {
    service: Arc<JobService>,
    requests: mpsc::UnboundedReceiver<Message>,
}

impl JobRequestListener {
    pub fn new(service: Arc<JobService>, requests: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { service, requests }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting job request listener");

        loop {
            tokio::select! {
                message = self.requests.recv() => {
                    match message {
                        Some(message) => self.handle(&message).await,
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Job request listener stopped");
    }

    async fn handle(&self, message: &Message) {
        let model: JobCreateModel = match message.body_as() {
            Ok(model) => model,
            Err(e) => {
                warn!("Skipping undecodable job request: {}", e);
                return;
            }
        };

        let caller = caller_from(message);
        let definition_id = model.job_definition_id.clone();

        match self.service.create_jobs(vec![model], &caller).await {
            Ok(jobs) => {
                for job in jobs {
                    info!(job_id = %job.id, "Created job of type {} from request", definition_id);
                }
            }
            Err(e) => error!(
                correlation_id = ?caller.correlation_id,
                "Failed to create requested job of type {}: {}",
                definition_id,
                e
            ),
        }
    }
}

fn caller_from(message: &Message) -> CallerContext {
    CallerContext {
        user_id: message.property(properties::USER_ID).map(str::to_string),
        user_name: message.property(properties::USER_NAME).map(str::to_string),
        correlation_id: message
            .property(properties::CORRELATION_ID)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::JobStore;
    use crate::service::testing::{Harness, create_model, definition};
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_caller_read_from_properties() {
        let mut props = HashMap::new();
        props.insert(properties::USER_ID.to_string(), "u-7".to_string());
        props.insert(properties::CORRELATION_ID.to_string(), "corr-1".to_string());

        let caller = caller_from(&Message::new("{}", props));
        assert_eq!(caller.user_id.as_deref(), Some("u-7"));
        assert_eq!(caller.user_name, None);
        assert_eq!(caller.correlation_id.as_deref(), Some("corr-1"));
    }

    #[tokio::test]
    async fn test_request_creates_job() {
        let h = Harness::new(vec![definition("calc-allocate", Duration::from_secs(60), false)]);
        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut props = HashMap::new();
        props.insert(properties::USER_ID.to_string(), "u-7".to_string());
        props.insert(properties::USER_NAME.to_string(), "Uploader".to_string());
        props.insert(properties::CORRELATION_ID.to_string(), "corr-9".to_string());
        tx.send(Message::json(&create_model("calc-allocate", "S1"), props).unwrap())
            .unwrap();
        tx.send(Message::new("garbage", HashMap::new())).unwrap();
        drop(tx);

        JobRequestListener::new(h.service.clone(), rx)
            .run(shutdown_rx)
            .await;

        let created = h.store.get_non_completed_jobs().await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].invoker_user_id.as_deref(), Some("u-7"));
        assert_eq!(created[0].invoker_user_display_name.as_deref(), Some("Uploader"));
        assert_eq!(created[0].correlation_id.as_deref(), Some("corr-9"));
    }
}
