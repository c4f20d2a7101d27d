//! Engine collaborators
//!
//! The calculation catalog, per-provider source data and the result store.
//! In-memory implementations back single-process runs and tests.

use async_trait::async_trait;
use fundflow_core::domain::calculation::{Calculation, ProviderResult};
use fundflow_core::domain::dataset::ProviderSourceDataset;
use fundflow_core::error::StoreError;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Calculations defined on a specification
#[async_trait]
pub trait CalculationRepository: Send + Sync {
    async fn get_calculations_by_specification_id(
        &self,
        specification_id: &str,
    ) -> Result<Vec<Calculation>, StoreError>;
}

/// Source datasets of one provider, `None` when the provider has none
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(
        &self,
        provider_id: &str,
        specification_id: &str,
    ) -> Result<Option<Vec<ProviderSourceDataset>>, StoreError>;
}

#[async_trait]
pub trait ProviderResultRepository: Send + Sync {
    /// Inserts or replaces results by id
    async fn save_provider_results(&self, results: &[ProviderResult]) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryCalculationRepository {
    calculations: RwLock<HashMap<String, Vec<Calculation>>>,
}

impl InMemoryCalculationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_calculations(&self, specification_id: &str, calculations: Vec<Calculation>) {
        self.calculations
            .write()
            .await
            .insert(specification_id.to_string(), calculations);
    }
}

#[async_trait]
impl CalculationRepository for InMemoryCalculationRepository {
    async fn get_calculations_by_specification_id(
        &self,
        specification_id: &str,
    ) -> Result<Vec<Calculation>, StoreError> {
        Ok(self
            .calculations
            .read()
            .await
            .get(specification_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryProviderResultRepository {
    results: RwLock<HashMap<String, ProviderResult>>,
}

impl InMemoryProviderResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<ProviderResult> {
        self.results.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }
}

#[async_trait]
impl ProviderResultRepository for InMemoryProviderResultRepository {
    async fn save_provider_results(&self, results: &[ProviderResult]) -> Result<(), StoreError> {
        let mut stored = self.results.write().await;
        for result in results {
            stored.insert(result.id.clone(), result.clone());
        }
        Ok(())
    }
}
