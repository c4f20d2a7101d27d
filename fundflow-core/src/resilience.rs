//! Resilience policy for outbound calls
//!
//! Every collaborator (job store, bus, notification channel, repositories)
//! gets its own [`ResiliencePolicy`] combining:
//! - a bulkhead capping concurrent calls,
//! - a circuit breaker that rejects calls after repeated failures,
//! - retry with exponential backoff for transient failures.
//!
//! Business logic never retries on its own; once the policy gives up the
//! error propagates like any other.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{PolicyError, Transient};

/// Tuning for a single dependency's policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive transient failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before letting one through
    pub reset_after: Duration,
    /// Bulkhead size
    pub max_concurrent_calls: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            failure_threshold: 5,
            reset_after: Duration::from_secs(30),
            max_concurrent_calls: 32,
        }
    }
}

impl ResilienceConfig {
    /// Reads overrides from `{PREFIX}_MAX_RETRIES`, `{PREFIX}_INITIAL_BACKOFF_MS`,
    /// `{PREFIX}_MAX_BACKOFF_MS`, `{PREFIX}_FAILURE_THRESHOLD`,
    /// `{PREFIX}_RESET_AFTER_SECS` and `{PREFIX}_MAX_CONCURRENT_CALLS`,
    /// keeping defaults for anything unset or unparsable.
    pub fn from_env(prefix: &str) -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        Self {
            max_retries: var("MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            initial_backoff: var("INITIAL_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: var("MAX_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            failure_threshold: var("FAILURE_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.failure_threshold),
            reset_after: var("RESET_AFTER_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.reset_after),
            max_concurrent_calls: var("MAX_CONCURRENT_CALLS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_calls),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.failure_threshold == 0 {
            anyhow::bail!("failure_threshold must be greater than 0");
        }

        if self.max_concurrent_calls == 0 {
            anyhow::bail!("max_concurrent_calls must be greater than 0");
        }

        if self.initial_backoff > self.max_backoff {
            anyhow::bail!("initial_backoff cannot exceed max_backoff");
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct Breaker {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

struct PolicyInner {
    name: String,
    config: ResilienceConfig,
    breaker: Mutex<Breaker>,
    bulkhead: Semaphore,
}

/// Retry + circuit breaker + bulkhead around one dependency
///
/// Cloning shares the breaker state and bulkhead.
#[derive(Clone)]
pub struct ResiliencePolicy {
    inner: Arc<PolicyInner>,
}

impl ResiliencePolicy {
    pub fn new(name: impl Into<String>, config: ResilienceConfig) -> Self {
        let bulkhead = Semaphore::new(config.max_concurrent_calls);
        Self {
            inner: Arc::new(PolicyInner {
                name: name.into(),
                config,
                breaker: Mutex::new(Breaker::default()),
                bulkhead,
            }),
        }
    }

    /// Policy that makes a single attempt and never opens
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ResilienceConfig {
                max_retries: 0,
                initial_backoff: Duration::ZERO,
                max_backoff: Duration::ZERO,
                failure_threshold: u32::MAX,
                reset_after: Duration::ZERO,
                max_concurrent_calls: Semaphore::MAX_PERMITS,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Runs `operation` under the policy.
    ///
    /// Non-transient errors are returned immediately and do not count
    /// towards opening the circuit.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<PolicyError> + Transient + Display,
    {
        let _permit = self
            .inner
            .bulkhead
            .acquire()
            .await
            .map_err(|_| PolicyError::BulkheadClosed(self.inner.name.clone()))?;

        let config = &self.inner.config;
        let mut attempt = 0u32;
        let mut delay = config.initial_backoff;

        loop {
            self.check_circuit()?;

            match operation().await {
                Ok(value) => {
                    self.record_success();
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    self.record_failure();
                    attempt += 1;

                    if attempt > config.max_retries {
                        warn!(
                            "Dependency '{}' failed after {} attempt(s): {}",
                            self.inner.name, attempt, err
                        );
                        return Err(err);
                    }

                    debug!(
                        "Dependency '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        self.inner.name,
                        attempt,
                        config.max_retries + 1,
                        delay,
                        err
                    );

                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(config.max_backoff);
                }
            }
        }
    }

    fn check_circuit(&self) -> Result<(), PolicyError> {
        let mut breaker = self.inner.breaker.lock().unwrap();

        if let Some(opened_at) = breaker.opened_at {
            if opened_at.elapsed() < self.inner.config.reset_after {
                return Err(PolicyError::CircuitOpen(self.inner.name.clone()));
            }

            // Half-open: one more failure re-opens the circuit.
            breaker.opened_at = None;
            breaker.consecutive_failures = self.inner.config.failure_threshold.saturating_sub(1);
        }

        Ok(())
    }

    fn record_success(&self) {
        let mut breaker = self.inner.breaker.lock().unwrap();
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    fn record_failure(&self) {
        let mut breaker = self.inner.breaker.lock().unwrap();
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);

        if breaker.opened_at.is_none()
            && breaker.consecutive_failures >= self.inner.config.failure_threshold
        {
            warn!("Circuit opened for dependency '{}'", self.inner.name);
            breaker.opened_at = Some(Instant::now());
        }
    }
}

impl std::fmt::Debug for ResiliencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePolicy")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish()
    }
}
