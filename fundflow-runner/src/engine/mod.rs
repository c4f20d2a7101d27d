//! Calculation engine
//!
//! Executes a specification's allocation model for every provider in scope
//! and assembles typed [`ProviderResult`](fundflow_core::domain::calculation::ProviderResult)s.

pub mod assembly;
pub mod calculator;
pub mod error;
pub mod model;
pub mod repository;

pub use calculator::{AllocationRun, CalculationEngine};
pub use error::{EngineError, ProviderCalculationError, ProviderFailure};
pub use model::{AllocationModel, AllocationModelLoader, ModelError, StaticModelLoader};
pub use repository::{CalculationRepository, DatasetFetcher, ProviderResultRepository};
