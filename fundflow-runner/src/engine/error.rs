//! Engine errors

use fundflow_core::error::StoreError;
use thiserror::Error;

use super::model::ModelError;

/// Why one provider could not be calculated
#[derive(Debug, Error)]
pub enum ProviderFailure {
    #[error("dataset fetch failed: {0}")]
    DatasetFetch(#[source] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("calculation task aborted: {0}")]
    Aborted(String),
}

/// Calculation failure of a single provider
#[derive(Debug, Error)]
#[error("provider {provider_id}: {failure}")]
pub struct ProviderCalculationError {
    pub provider_id: String,
    #[source]
    pub failure: ProviderFailure,
}

impl ProviderCalculationError {
    pub fn new(provider_id: impl Into<String>, failure: ProviderFailure) -> Self {
        Self {
            provider_id: provider_id.into(),
            failure,
        }
    }
}

/// Failure of a whole allocation run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load allocation model: {0}")]
    ModelLoad(#[source] ModelError),

    #[error("failed to load calculations for specification {specification_id}: {source}")]
    Catalog {
        specification_id: String,
        #[source]
        source: StoreError,
    },

    /// First provider failure when the run is configured to abort
    #[error("allocation run aborted: {0}")]
    ProviderFailed(#[from] ProviderCalculationError),
}
