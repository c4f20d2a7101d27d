//! Node configuration

use fundflow_orchestrator::OrchestratorConfig;
use fundflow_runner::RunnerConfig;

/// Everything a single-process node needs
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub orchestrator: OrchestratorConfig,
    pub runner: RunnerConfig,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            orchestrator: OrchestratorConfig::from_env(),
            runner: RunnerConfig::from_env(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.orchestrator.validate()?;
        self.runner.validate()?;

        if self.orchestrator.job_request_queue != self.runner.dataset.job_request_queue {
            anyhow::bail!(
                "dataset pipeline sends job requests to '{}' but the orchestrator listens on '{}'",
                self.runner.dataset.job_request_queue,
                self.orchestrator.job_request_queue
            );
        }

        Ok(())
    }
}
