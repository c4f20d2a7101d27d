//! Message bus abstraction
//!
//! Work is dispatched as JSON payloads plus a string property map used for
//! routing. Transport mechanics live behind [`MessageSender`]; the
//! [`InMemoryBus`] implementation backs single-process deployments and tests.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::BusError;
use crate::resilience::ResiliencePolicy;

/// Well-known message property keys
pub mod properties {
    pub const JOB_ID: &str = "jobId";
    pub const SPECIFICATION_ID: &str = "specification-id";
    pub const RELATIONSHIP_ID: &str = "relationship-id";
    pub const PROVIDER_CACHE_KEY: &str = "provider-cache-key";
    pub const CORRELATION_ID: &str = "sfa-correlationId";
    pub const USER_ID: &str = "user-id";
    pub const USER_NAME: &str = "user-name";
}

/// A message travelling over a queue or topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub body: String,
    pub properties: HashMap<String, String>,
}

impl Message {
    pub fn new(body: impl Into<String>, properties: HashMap<String, String>) -> Self {
        Self {
            body: body.into(),
            properties,
        }
    }

    /// Serializes `body` as JSON
    pub fn json<T: Serialize>(
        body: &T,
        properties: HashMap<String, String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_string(body)?, properties))
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The job this message belongs to, when it carries a valid `jobId`
    pub fn job_id(&self) -> Option<Uuid> {
        self.property(properties::JOB_ID)
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Sends messages to named queues and topics
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_to_queue(&self, queue: &str, message: Message) -> Result<(), BusError>;

    async fn send_to_topic(&self, topic: &str, message: Message) -> Result<(), BusError>;
}

struct Channel {
    sender: mpsc::UnboundedSender<Message>,
    receiver: Option<mpsc::UnboundedReceiver<Message>>,
}

impl Channel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// In-process bus with one consumer per queue or topic
///
/// Messages sent before a consumer attaches are buffered in the channel.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    channels: Arc<Mutex<HashMap<String, Channel>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the consumer side of a queue. Only the first caller gets it.
    pub fn take_queue_receiver(&self, queue: &str) -> Option<mpsc::UnboundedReceiver<Message>> {
        self.take_receiver(&queue_key(queue))
    }

    /// Takes the consumer side of a topic. Only the first caller gets it.
    pub fn take_topic_receiver(&self, topic: &str) -> Option<mpsc::UnboundedReceiver<Message>> {
        self.take_receiver(&topic_key(topic))
    }

    fn take_receiver(&self, key: &str) -> Option<mpsc::UnboundedReceiver<Message>> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(key.to_string())
            .or_insert_with(Channel::new)
            .receiver
            .take()
    }

    fn send(&self, key: &str, message: Message) -> Result<(), BusError> {
        let sender = {
            let mut channels = self.channels.lock().unwrap();
            channels
                .entry(key.to_string())
                .or_insert_with(Channel::new)
                .sender
                .clone()
        };

        sender
            .send(message)
            .map_err(|_| BusError::Unavailable(key.to_string()))
    }
}

fn queue_key(name: &str) -> String {
    format!("queue:{}", name)
}

fn topic_key(name: &str) -> String {
    format!("topic:{}", name)
}

#[async_trait]
impl MessageSender for InMemoryBus {
    async fn send_to_queue(&self, queue: &str, message: Message) -> Result<(), BusError> {
        tracing::debug!("Sending message to queue '{}'", queue);
        self.send(&queue_key(queue), message)
    }

    async fn send_to_topic(&self, topic: &str, message: Message) -> Result<(), BusError> {
        tracing::debug!("Sending message to topic '{}'", topic);
        self.send(&topic_key(topic), message)
    }
}

/// Routes every send through a resilience policy
pub struct ResilientMessageSender {
    inner: Arc<dyn MessageSender>,
    policy: ResiliencePolicy,
}

impl ResilientMessageSender {
    pub fn new(inner: Arc<dyn MessageSender>, policy: ResiliencePolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl MessageSender for ResilientMessageSender {
    async fn send_to_queue(&self, queue: &str, message: Message) -> Result<(), BusError> {
        self.policy
            .execute(|| self.inner.send_to_queue(queue, message.clone()))
            .await
    }

    async fn send_to_topic(&self, topic: &str, message: Message) -> Result<(), BusError> {
        self.policy
            .execute(|| self.inner.send_to_topic(topic, message.clone()))
            .await
    }
}
