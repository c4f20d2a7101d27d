//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used between fundflow services (orchestrator,
//! runner). DTOs are the request and message shapes that travel over the
//! bus or through service calls.

pub mod dataset;
pub mod job;
pub mod log;
