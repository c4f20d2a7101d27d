//! Service errors

use fundflow_core::error::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Failure of a job management operation
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    /// A referenced definition or parent does not exist
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Internal(String),

    #[error("job store failure: {0}")]
    Store(#[from] StoreError),
}

impl JobError {
    /// HTTP-style status code for callers that expose these operations remotely
    pub fn status_code(&self) -> u16 {
        match self {
            JobError::Validation(_) => 400,
            JobError::NotFound(_) => 404,
            JobError::InvalidState(_) => 409,
            JobError::PreconditionFailed(_) => 412,
            JobError::Internal(_) | JobError::Store(_) => 500,
        }
    }
}
