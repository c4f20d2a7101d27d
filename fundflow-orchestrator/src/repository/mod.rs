//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository is a trait so storage can be swapped without touching
//! the services; in-memory implementations live next to the traits.

pub mod definition;
pub mod job;
pub mod notification;
pub mod resilient;

// Re-export for convenience
pub use definition::{JobDefinitionRegistry, StaticJobDefinitionRegistry};
pub use job::{InMemoryJobStore, JobStore};
pub use notification::{NotificationChannel, TopicNotificationChannel};
pub use resilient::{ResilientJobStore, ResilientNotificationChannel};
