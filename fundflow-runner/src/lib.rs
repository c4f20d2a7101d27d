//! Allocation runner
//!
//! The calculation engine, the dataset pipeline and the queue workers that
//! drive them.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod worker;

pub use config::RunnerConfig;
