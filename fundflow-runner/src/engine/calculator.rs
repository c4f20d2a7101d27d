//! Calculation engine
//!
//! Runs an allocation model over a set of providers with bounded
//! parallelism. Dataset fetches are async; model execution goes to the
//! blocking pool. Each provider yields its own `Result`, and the configured
//! [`ProviderFailurePolicy`] decides whether one failure sinks the run.

use chrono::Utc;
use fundflow_core::domain::calculation::{Calculation, ProviderResult};
use fundflow_core::domain::dataset::BuildProject;
use fundflow_core::domain::provider::ProviderSummary;
use fundflow_core::resilience::ResiliencePolicy;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::assembly::build_provider_result;
use super::error::{EngineError, ProviderCalculationError, ProviderFailure};
use super::model::{AllocationModel, AllocationModelLoader, ModelError};
use super::repository::{CalculationRepository, DatasetFetcher};
use crate::config::{EngineConfig, ProviderFailurePolicy};

/// Outcome of an allocation run
#[derive(Debug, Default)]
pub struct AllocationRun {
    /// Successful providers, ordered by provider id
    pub results: Vec<ProviderResult>,
    /// Providers that failed, ordered by provider id
    pub failures: Vec<ProviderCalculationError>,
}

impl AllocationRun {
    pub fn provider_count(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CalculationEngine {
    loader: Arc<dyn AllocationModelLoader>,
    calculations: Arc<dyn CalculationRepository>,
    policy: ResiliencePolicy,
    config: EngineConfig,
}

impl CalculationEngine {
    pub fn new(
        loader: Arc<dyn AllocationModelLoader>,
        calculations: Arc<dyn CalculationRepository>,
        policy: ResiliencePolicy,
        config: EngineConfig,
    ) -> Self {
        Self {
            loader,
            calculations,
            policy,
            config,
        }
    }

    /// Calculates every provider against the build project's model
    pub async fn generate_allocations(
        &self,
        build_project: &BuildProject,
        providers: Vec<ProviderSummary>,
        fetcher: Arc<dyn DatasetFetcher>,
    ) -> Result<AllocationRun, EngineError> {
        let specification_id = build_project.specification_id.clone();

        let model = self
            .loader
            .load(build_project)
            .await
            .map_err(EngineError::ModelLoad)?;

        let catalog = self
            .policy
            .execute(|| {
                self.calculations
                    .get_calculations_by_specification_id(&specification_id)
            })
            .await
            .map_err(|source| EngineError::Catalog {
                specification_id: specification_id.clone(),
                source,
            })?;
        let catalog: Arc<[Calculation]> = catalog.into();

        info!(
            specification_id = %specification_id,
            "Generating allocations for {} provider(s) across {} calculation(s)",
            providers.len(),
            catalog.len()
        );
        let started = Instant::now();

        let mut outcomes = stream::iter(providers.into_iter().map(|provider| {
            calculate_provider(
                provider,
                specification_id.clone(),
                Arc::clone(&model),
                Arc::clone(&catalog),
                Arc::clone(&fetcher),
                self.policy.clone(),
            )
        }))
        .buffer_unordered(self.config.max_parallel_providers);

        let mut run = AllocationRun::default();

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(result) => run.results.push(result),
                Err(err) => match self.config.failure_policy {
                    ProviderFailurePolicy::AbortBatch => {
                        error!(
                            specification_id = %specification_id,
                            "Aborting allocation run: {}",
                            err
                        );
                        return Err(EngineError::ProviderFailed(err));
                    }
                    ProviderFailurePolicy::ContinueAndReport => {
                        warn!(specification_id = %specification_id, "{}", err);
                        run.failures.push(err);
                    }
                },
            }
        }

        run.results.sort_by(|a, b| a.provider.id.cmp(&b.provider.id));
        run.failures.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));

        info!(
            specification_id = %specification_id,
            "Allocation run finished in {:?}: {} succeeded, {} failed",
            started.elapsed(),
            run.results.len(),
            run.failures.len()
        );

        Ok(run)
    }
}

async fn calculate_provider(
    provider: ProviderSummary,
    specification_id: String,
    model: Arc<dyn AllocationModel>,
    catalog: Arc<[Calculation]>,
    fetcher: Arc<dyn DatasetFetcher>,
    policy: ResiliencePolicy,
) -> Result<ProviderResult, ProviderCalculationError> {
    let provider_id = provider.id.clone();

    let datasets = policy
        .execute(|| fetcher.fetch(&provider_id, &specification_id))
        .await
        .map_err(|e| ProviderCalculationError::new(&provider_id, ProviderFailure::DatasetFetch(e)))?
        .unwrap_or_default();

    let task = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let raw = model.execute(&provider, &datasets)?;
        debug!(
            provider_id = %provider.id,
            "Model executed in {:?} over {} dataset(s)",
            started.elapsed(),
            datasets.len()
        );
        Ok::<_, ModelError>(build_provider_result(
            provider,
            &specification_id,
            &catalog,
            raw,
            Utc::now(),
        ))
    });

    match task.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(ProviderCalculationError::new(
            provider_id,
            ProviderFailure::Model(err),
        )),
        Err(join) => Err(ProviderCalculationError::new(
            provider_id,
            ProviderFailure::Aborted(join.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::StaticModelLoader;
    use crate::engine::repository::InMemoryCalculationRepository;
    use async_trait::async_trait;
    use fundflow_core::domain::calculation::{
        Calculation, CalculationResult, CalculationType, Reference,
    };
    use fundflow_core::domain::dataset::ProviderSourceDataset;
    use fundflow_core::error::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one result for c1; fails for providers named in `failing`
    struct StubModel {
        failing: Vec<String>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubModel {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl AllocationModel for StubModel {
        fn execute(
            &self,
            provider: &ProviderSummary,
            datasets: &[ProviderSourceDataset],
        ) -> Result<Vec<CalculationResult>, ModelError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&provider.id) {
                return Err(ModelError::Execution(format!("divide by zero for {}", provider.id)));
            }

            Ok(vec![CalculationResult {
                calculation: Reference::new("c1", "c1"),
                calculation_type: CalculationType::Funding,
                value: Some(datasets.len() as f64),
                exception_type: None,
                exception_message: None,
                allocation_line: None,
            }])
        }
    }

    struct NoDatasets;

    #[async_trait]
    impl DatasetFetcher for NoDatasets {
        async fn fetch(
            &self,
            provider_id: &str,
            _specification_id: &str,
        ) -> Result<Option<Vec<ProviderSourceDataset>>, StoreError> {
            if provider_id == "broken-store" {
                return Err(StoreError::NotFound("datasets".to_string()));
            }
            Ok(None)
        }
    }

    fn providers(n: usize) -> Vec<ProviderSummary> {
        (0..n)
            .map(|i| ProviderSummary {
                id: format!("p{:02}", i),
                name: format!("Provider {}", i),
                ..ProviderSummary::default()
            })
            .collect()
    }

    fn project() -> BuildProject {
        BuildProject {
            id: "bp1".to_string(),
            specification_id: "S1".to_string(),
            dataset_relationships: vec![],
        }
    }

    async fn engine(model: Arc<StubModel>, policy: ProviderFailurePolicy) -> CalculationEngine {
        let calculations = InMemoryCalculationRepository::new();
        calculations
            .set_calculations(
                "S1",
                vec![
                    Calculation {
                        id: "c1".to_string(),
                        name: "Basic".to_string(),
                        calculation_type: CalculationType::Funding,
                        allocation_line: Some(Reference::new("al1", "Line 1")),
                    },
                    Calculation {
                        id: "c2".to_string(),
                        name: "Pupils".to_string(),
                        calculation_type: CalculationType::Number,
                        allocation_line: None,
                    },
                ],
            )
            .await;

        CalculationEngine::new(
            Arc::new(StaticModelLoader::new().with_model("S1", model)),
            Arc::new(calculations),
            ResiliencePolicy::passthrough("test"),
            EngineConfig {
                max_parallel_providers: 3,
                failure_policy: policy,
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_provider_gets_complete_result_with_bounded_parallelism() {
        let model = Arc::new(StubModel::new(&[]));
        let engine = engine(model.clone(), ProviderFailurePolicy::ContinueAndReport).await;

        let run = engine
            .generate_allocations(&project(), providers(12), Arc::new(NoDatasets))
            .await
            .unwrap();

        assert_eq!(run.results.len(), 12);
        assert!(run.is_complete_success());
        assert!(model.peak.load(Ordering::SeqCst) <= 3);

        for result in &run.results {
            let ids: Vec<&str> = result
                .calculation_results
                .iter()
                .map(|r| r.calculation.id.as_str())
                .collect();
            assert_eq!(ids, vec!["c1", "c2"]);
            assert_eq!(result.calculation_results[1].value, None);
        }
        assert_eq!(run.results[0].provider.id, "p00");
    }

    #[tokio::test]
    async fn test_continue_policy_collects_failures() {
        let model = Arc::new(StubModel::new(&["p01", "p03"]));
        let engine = engine(model, ProviderFailurePolicy::ContinueAndReport).await;

        let run = engine
            .generate_allocations(&project(), providers(5), Arc::new(NoDatasets))
            .await
            .unwrap();

        assert_eq!(run.results.len(), 3);
        assert_eq!(run.provider_count(), 5);
        let failed: Vec<&str> = run.failures.iter().map(|f| f.provider_id.as_str()).collect();
        assert_eq!(failed, vec!["p01", "p03"]);
        assert!(matches!(run.failures[0].failure, ProviderFailure::Model(_)));
    }

    #[tokio::test]
    async fn test_abort_policy_fails_the_run() {
        let model = Arc::new(StubModel::new(&["p02"]));
        let engine = engine(model, ProviderFailurePolicy::AbortBatch).await;

        let err = engine
            .generate_allocations(&project(), providers(5), Arc::new(NoDatasets))
            .await
            .unwrap_err();

        match err {
            EngineError::ProviderFailed(failure) => assert_eq!(failure.provider_id, "p02"),
            other => panic!("expected provider failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dataset_fetch_failure_is_per_provider() {
        let model = Arc::new(StubModel::new(&[]));
        let engine = engine(model, ProviderFailurePolicy::ContinueAndReport).await;
        let mut all = providers(2);
        all.push(ProviderSummary {
            id: "broken-store".to_string(),
            ..ProviderSummary::default()
        });

        let run = engine
            .generate_allocations(&project(), all, Arc::new(NoDatasets))
            .await
            .unwrap();

        assert_eq!(run.results.len(), 2);
        assert!(matches!(
            run.failures[0].failure,
            ProviderFailure::DatasetFetch(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_model_fails_before_any_provider() {
        let engine = engine(
            Arc::new(StubModel::new(&[])),
            ProviderFailurePolicy::ContinueAndReport,
        )
        .await;
        let other = BuildProject {
            specification_id: "S-unknown".to_string(),
            ..project()
        };

        let err = engine
            .generate_allocations(&other, providers(2), Arc::new(NoDatasets))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelLoad(ModelError::NotFound(_))));
    }
}
