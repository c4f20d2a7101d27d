//! fundflow core
//!
//! Shared types and abstractions for the fundflow job and calculation platform.
//!
//! This crate contains:
//! - Domain types: jobs, job logs, job definitions, notifications,
//!   calculation results and per-provider dataset records
//! - DTOs: request and message shapes exchanged between services
//! - Collaborator plumbing: error types, the message bus abstraction and
//!   the resilience policy wrapped around every outbound call

pub mod domain;
pub mod dto;
pub mod error;
pub mod messaging;
pub mod reporting;
pub mod resilience;
