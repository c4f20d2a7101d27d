//! Completion listener
//!
//! Consumes job notifications and hands completed ones to the job service
//! so parents complete when their last child does.

use fundflow_core::domain::notification::JobNotification;
use fundflow_core::messaging::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::service::JobService;

pub struct CompletionListener {
    service: Arc<JobService>,
    notifications: mpsc::UnboundedReceiver<Message>,
}

impl CompletionListener {
    pub fn new(service: Arc<JobService>, notifications: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            service,
            notifications,
        }
    }

    /// Processes notifications until the topic closes or `shutdown` flips
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting completion listener");

        loop {
            tokio::select! {
                message = self.notifications.recv() => {
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

        info!("Completion listener stopped");
    }

    async fn handle(&self, message: &Message) {
        let notification: JobNotification = match message.body_as() {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Skipping undecodable job notification: {}", e);
                return;
            }
        };

        if !notification.is_completed() {
            return;
        }

        if let Err(e) = self.service.process_job_completion(&notification).await {
            error!(
                job_id = %notification.job_id,
                "Failed to process job completion: {}",
                e
            );
        }
    }
}
