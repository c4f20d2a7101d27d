//! Dataset pipeline
//!
//! Turns uploaded dataset versions into per-provider source data.

pub mod cache;
pub mod error;
pub mod grouping;
pub mod index;
pub mod memory;
pub mod pipeline;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

pub use error::DatasetError;
pub use memory::{
    InMemoryDatasetStore, InMemoryProviderRepository, InMemoryProviderSourceDatasetRepository,
};
pub use pipeline::{DatasetPipeline, DatasetProcessSummary, DatasetRepositories};
pub use repository::{
    BuildProjectRepository, DatasetDefinitionRepository, NewVersion, ProviderRepository,
    ProviderSourceDatasetRepository, TableReader,
};
