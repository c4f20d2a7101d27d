//! Notification Channel
//!
//! Publishes [`JobNotification`]s for subscribers (parent completion,
//! progress displays, downstream automation).

use async_trait::async_trait;
use fundflow_core::domain::notification::JobNotification;
use fundflow_core::error::BusError;
use fundflow_core::messaging::{Message, MessageSender};
use std::sync::Arc;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send_notification(&self, notification: &JobNotification) -> Result<(), BusError>;
}

/// Publishes notifications as JSON onto a message bus topic
///
/// Partition properties (job id, job type, specification, entity, parent)
/// travel as message properties so subscribers can filter.
pub struct TopicNotificationChannel {
    sender: Arc<dyn MessageSender>,
    topic: String,
}

impl TopicNotificationChannel {
    pub fn new(sender: Arc<dyn MessageSender>, topic: impl Into<String>) -> Self {
        Self {
            sender,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for TopicNotificationChannel {
    async fn send_notification(&self, notification: &JobNotification) -> Result<(), BusError> {
        let message = Message::json(notification, notification.partition_properties())?;
        self.sender.send_to_topic(&self.topic, message).await
    }
}
