//! Runner configuration
//!
//! Defines the tunables for the worker loop, the calculation engine and the
//! dataset pipeline. Values are read once at startup and passed down by
//! value; nothing here is global.

use fundflow_core::domain::definition::{bus_names, job_definition_ids};
use fundflow_core::resilience::ResilienceConfig;
use std::time::Duration;

/// What the engine does when one provider's calculation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderFailurePolicy {
    /// Keep going and report failed providers next to the results
    #[default]
    ContinueAndReport,
    /// Stop at the first failed provider and fail the whole run
    AbortBatch,
}

impl std::str::FromStr for ProviderFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "continueandreport" | "continue" => Ok(ProviderFailurePolicy::ContinueAndReport),
            "abortbatch" | "abort" => Ok(ProviderFailurePolicy::AbortBatch),
            other => anyhow::bail!("unknown provider failure policy: {}", other),
        }
    }
}

/// Calculation engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Providers calculated concurrently
    pub max_parallel_providers: usize,
    pub failure_policy: ProviderFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_providers: 5,
            failure_policy: ProviderFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Reads MAX_PARALLEL_PROVIDERS and PROVIDER_FAILURE_POLICY
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_parallel_providers: std::env::var("MAX_PARALLEL_PROVIDERS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_parallel_providers),
            failure_policy: std::env::var("PROVIDER_FAILURE_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.failure_policy),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_parallel_providers == 0 {
            anyhow::bail!("max_parallel_providers must be greater than 0");
        }

        Ok(())
    }
}

/// Dataset pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPipelineConfig {
    /// Concurrent version creations while saving provider source data
    pub save_concurrency: usize,

    /// How long loaded table data stays cached
    pub table_cache_ttl: Duration,

    pub table_cache_capacity: u64,

    /// How long the provider summary list stays cached
    pub provider_cache_ttl: Duration,

    /// Queue that receives the follow-up calculation job request
    pub job_request_queue: String,

    /// Job definition requested when a scoping dataset changes
    pub calculation_job_definition_id: String,
}

impl Default for DatasetPipelineConfig {
    fn default() -> Self {
        Self {
            save_concurrency: 15,
            table_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            table_cache_capacity: 100,
            provider_cache_ttl: Duration::from_secs(60 * 60),
            job_request_queue: bus_names::CREATE_JOB_QUEUE.to_string(),
            calculation_job_definition_id: job_definition_ids::CREATE_INSTRUCT_ALLOCATION_JOB
                .to_string(),
        }
    }
}

impl DatasetPipelineConfig {
    /// Reads DATASET_SAVE_CONCURRENCY, TABLE_CACHE_TTL (seconds),
    /// TABLE_CACHE_CAPACITY, PROVIDER_CACHE_TTL (seconds) and
    /// JOB_REQUEST_QUEUE
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            save_concurrency: std::env::var("DATASET_SAVE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.save_concurrency),
            table_cache_ttl: secs("TABLE_CACHE_TTL", defaults.table_cache_ttl),
            table_cache_capacity: std::env::var("TABLE_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(defaults.table_cache_capacity),
            provider_cache_ttl: secs("PROVIDER_CACHE_TTL", defaults.provider_cache_ttl),
            job_request_queue: std::env::var("JOB_REQUEST_QUEUE")
                .unwrap_or(defaults.job_request_queue),
            calculation_job_definition_id: defaults.calculation_job_definition_id,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.save_concurrency == 0 {
            anyhow::bail!("save_concurrency must be greater than 0");
        }

        if self.table_cache_ttl.is_zero() {
            anyhow::bail!("table_cache_ttl must be greater than 0");
        }

        if self.job_request_queue.trim().is_empty() {
            anyhow::bail!("job_request_queue cannot be empty");
        }

        Ok(())
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Jobs handled concurrently per queue
    pub max_parallel_jobs: usize,

    /// Queue carrying calculation jobs
    pub calculation_queue: String,

    /// Queue carrying dataset mapping jobs
    pub dataset_queue: String,

    pub engine: EngineConfig,
    pub dataset: DatasetPipelineConfig,

    /// Policy applied to every repository call
    pub repository_policy: ResilienceConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: 2,
            calculation_queue: bus_names::CALCULATE_ALLOCATIONS_QUEUE.to_string(),
            dataset_queue: bus_names::MAP_DATASET_QUEUE.to_string(),
            engine: EngineConfig::default(),
            dataset: DatasetPipelineConfig::default(),
            repository_policy: ResilienceConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - MAX_PARALLEL_JOBS (default: 2)
    /// - CALCULATION_QUEUE, DATASET_QUEUE
    /// - engine, dataset and REPOSITORY_* resilience overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_parallel_jobs: std::env::var("MAX_PARALLEL_JOBS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_parallel_jobs),
            calculation_queue: std::env::var("CALCULATION_QUEUE")
                .unwrap_or(defaults.calculation_queue),
            dataset_queue: std::env::var("DATASET_QUEUE").unwrap_or(defaults.dataset_queue),
            engine: EngineConfig::from_env(),
            dataset: DatasetPipelineConfig::from_env(),
            repository_policy: ResilienceConfig::from_env("REPOSITORY"),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.calculation_queue.is_empty() || self.dataset_queue.is_empty() {
            anyhow::bail!("queue names cannot be empty");
        }

        if self.calculation_queue == self.dataset_queue {
            anyhow::bail!("calculation and dataset queues must differ");
        }

        self.engine.validate()?;
        self.dataset.validate()?;
        self.repository_policy.validate()?;

        Ok(())
    }
}
