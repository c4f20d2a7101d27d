//! Job management for fundflow
//!
//! Owns the job lifecycle: validated creation, dispatch to the message bus,
//! progress logging, supersession, timeouts and parent/child completion.
//! Storage, definitions and notifications sit behind the traits in
//! [`repository`]; [`scheduler`] holds the background loops that drive the
//! service without a caller.

pub mod config;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use config::OrchestratorConfig;
pub use service::{JobError, JobService};
