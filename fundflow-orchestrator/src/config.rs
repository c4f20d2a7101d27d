//! Orchestrator configuration
//!
//! Built once at startup and handed to the constructors that need it.

use fundflow_core::domain::definition::bus_names;
use fundflow_core::resilience::ResilienceConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How often the timeout sweep runs
    pub timeout_sweep_interval: Duration,

    /// Topic job notifications are published on
    pub notification_topic: String,

    /// Queue job creation requests arrive on
    pub job_request_queue: String,

    /// JSON file of job definitions; the built-in set is used when unset
    pub job_definitions_path: Option<PathBuf>,

    pub job_store_policy: ResilienceConfig,
    pub notification_policy: ResilienceConfig,
    pub messaging_policy: ResilienceConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout_sweep_interval: Duration::from_secs(60),
            notification_topic: bus_names::JOB_NOTIFICATIONS_TOPIC.to_string(),
            job_request_queue: bus_names::CREATE_JOB_QUEUE.to_string(),
            job_definitions_path: None,
            job_store_policy: ResilienceConfig::default(),
            notification_policy: ResilienceConfig::default(),
            messaging_policy: ResilienceConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - TIMEOUT_SWEEP_INTERVAL (seconds, default: 60)
    /// - NOTIFICATION_TOPIC (default: job-notifications)
    /// - JOB_REQUEST_QUEUE (default: jobs-create-job)
    /// - JOB_DEFINITIONS_PATH
    /// - JOB_STORE_*, NOTIFICATIONS_*, MESSAGING_* resilience overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout_sweep_interval = std::env::var("TIMEOUT_SWEEP_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout_sweep_interval);

        Self {
            timeout_sweep_interval,
            notification_topic: std::env::var("NOTIFICATION_TOPIC")
                .unwrap_or(defaults.notification_topic),
            job_request_queue: std::env::var("JOB_REQUEST_QUEUE")
                .unwrap_or(defaults.job_request_queue),
            job_definitions_path: std::env::var("JOB_DEFINITIONS_PATH").ok().map(PathBuf::from),
            job_store_policy: ResilienceConfig::from_env("JOB_STORE"),
            notification_policy: ResilienceConfig::from_env("NOTIFICATIONS"),
            messaging_policy: ResilienceConfig::from_env("MESSAGING"),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_sweep_interval.is_zero() {
            anyhow::bail!("timeout_sweep_interval must be greater than 0");
        }

        if self.notification_topic.trim().is_empty() {
            anyhow::bail!("notification_topic cannot be empty");
        }

        if self.job_request_queue.trim().is_empty() {
            anyhow::bail!("job_request_queue cannot be empty");
        }

        self.job_store_policy.validate()?;
        self.notification_policy.validate()?;
        self.messaging_policy.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_sweep_interval, Duration::from_secs(60));
        assert!(config.job_definitions_path.is_none());
    }

    #[test]
    fn test_validation_zero_interval() {
        let config = OrchestratorConfig {
            timeout_sweep_interval: Duration::ZERO,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_checks_policies() {
        let mut config = OrchestratorConfig::default();
        config.messaging_policy.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_topic() {
        let config = OrchestratorConfig {
            notification_topic: " ".to_string(),
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
