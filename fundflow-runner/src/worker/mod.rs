//! Queue workers
//!
//! Consume the calculation and dataset queues and report job progress.

pub mod calculation;
pub mod consumer;
pub mod dataset;
pub mod handler;

pub use calculation::CalculationJobHandler;
pub use consumer::QueueWorker;
pub use dataset::DatasetJobHandler;
pub use handler::{HandlerOutcome, JobHandler};
