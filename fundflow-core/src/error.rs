//! Errors raised by external collaborators
//!
//! Repositories, the message bus and the notification channel all fail with
//! one of these types. The resilience policy decides what to retry by
//! asking [`Transient::is_transient`].

use thiserror::Error;

/// Failure reported by a resilience policy before the call was attempted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("circuit open for dependency '{0}'")]
    CircuitOpen(String),

    #[error("bulkhead closed for dependency '{0}'")]
    BulkheadClosed(String),
}

/// Errors from repositories and document stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors from queue, topic and notification sends
#[derive(Debug, Error)]
pub enum BusError {
    #[error("destination '{0}' is not available")]
    Unavailable(String),

    #[error("failed to encode message: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Classifies failures worth retrying
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

impl Transient for BusError {
    fn is_transient(&self) -> bool {
        matches!(self, BusError::Transport(_) | BusError::Unavailable(_))
    }
}
