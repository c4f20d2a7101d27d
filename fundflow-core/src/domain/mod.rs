//! Core domain types
//!
//! This module contains the domain structures shared across fundflow
//! services. They represent the business entities and are shared between
//! the orchestrator (which persists and mutates jobs) and the runner (which
//! executes calculations and dataset processing).

pub mod calculation;
pub mod dataset;
pub mod definition;
pub mod job;
pub mod log;
pub mod notification;
pub mod provider;
