//! Calculation job handler

use anyhow::Context;
use async_trait::async_trait;
use fundflow_core::messaging::{Message, properties};
use fundflow_core::resilience::ResiliencePolicy;
use std::sync::Arc;
use tracing::{info, warn};

use super::handler::{HandlerOutcome, JobHandler};
use crate::dataset::{BuildProjectRepository, ProviderRepository};
use crate::engine::{CalculationEngine, DatasetFetcher, ProviderResultRepository};

/// Generates allocations for every provider in a specification's scope and
/// stores the results.
pub struct CalculationJobHandler {
    engine: Arc<CalculationEngine>,
    build_projects: Arc<dyn BuildProjectRepository>,
    providers: Arc<dyn ProviderRepository>,
    fetcher: Arc<dyn DatasetFetcher>,
    results: Arc<dyn ProviderResultRepository>,
    policy: ResiliencePolicy,
}

impl CalculationJobHandler {
    pub fn new(
        engine: Arc<CalculationEngine>,
        build_projects: Arc<dyn BuildProjectRepository>,
        providers: Arc<dyn ProviderRepository>,
        fetcher: Arc<dyn DatasetFetcher>,
        results: Arc<dyn ProviderResultRepository>,
        policy: ResiliencePolicy,
    ) -> Self {
        Self {
            engine,
            build_projects,
            providers,
            fetcher,
            results,
            policy,
        }
    }
}

#[async_trait]
impl JobHandler for CalculationJobHandler {
    fn name(&self) -> &'static str {
        "calculation"
    }

    async fn handle(&self, message: &Message) -> anyhow::Result<HandlerOutcome> {
        let specification_id = message
            .property(properties::SPECIFICATION_ID)
            .context("message has no specification-id property")?;

        let build_project = self
            .policy
            .execute(|| {
                self.build_projects
                    .get_build_project_by_specification_id(specification_id)
            })
            .await?
            .with_context(|| {
                format!("build project for specification {} not found", specification_id)
            })?;

        let providers = self
            .policy
            .execute(|| self.providers.get_scoped_providers(specification_id))
            .await?;

        if providers.is_empty() {
            info!(specification_id, "No providers in scope, nothing to calculate");
            return Ok(HandlerOutcome::new("No providers in scope"));
        }

        let run = self
            .engine
            .generate_allocations(&build_project, providers, Arc::clone(&self.fetcher))
            .await?;

        for failure in &run.failures {
            warn!(specification_id, "{}", failure);
        }

        if run.results.is_empty() && !run.failures.is_empty() {
            anyhow::bail!("all {} provider(s) failed to calculate", run.failures.len());
        }

        self.policy
            .execute(|| self.results.save_provider_results(&run.results))
            .await
            .context("failed to save provider results")?;

        Ok(HandlerOutcome::new(format!(
            "Calculated {} of {} provider(s)",
            run.results.len(),
            run.provider_count()
        ))
        .with_counts(run.provider_count(), run.results.len(), run.failures.len()))
    }
}
