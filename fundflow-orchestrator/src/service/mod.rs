//! Service Module
//!
//! Business logic layer for the orchestrator.
//! [`JobService`] owns the job lifecycle; its operations are split across
//! the submodules by concern.

pub mod completion;
pub mod error;
pub mod job;
pub mod log;
pub mod timeout;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export for convenience
pub use error::JobError;
pub use job::JobService;
