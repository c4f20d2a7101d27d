//! Timeout sweeper
//!
//! Runs the job service's timeout sweep on a fixed interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

use crate::service::JobService;

pub struct TimeoutSweeper {
    service: Arc<JobService>,
    interval: Duration,
}

impl TimeoutSweeper {
    pub fn new(service: Arc<JobService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweeps until `shutdown` becomes `true`
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting timeout sweeper (interval: {:?})", self.interval);

        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Timeout sweeper stopped");
    }

    async fn sweep_once(&self) {
        debug!("Checking for timed out jobs");

        match self.service.check_and_process_timed_out_jobs().await {
            Ok(0) => {}
            Ok(count) => info!("Timeout sweep completed {} job(s)", count),
            Err(e) => error!("Error during timeout sweep: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{Harness, definition};
    use fundflow_core::domain::job::{CompletionStatus, RunningStatus};

    #[tokio::test]
    async fn test_sweeper_times_out_and_stops() {
        let h = Harness::new(vec![definition("calc-allocate", Duration::from_secs(60), false)]);
        let mut job = crate::service::testing::job_fixture();
        job.created = chrono::Utc::now() - chrono::TimeDelta::minutes(5);
        let job = h.insert(job).await;

        let (tx, rx) = watch::channel(false);
        let sweeper = TimeoutSweeper::new(h.service.clone(), Duration::from_millis(10));
        let handle = tokio::spawn(sweeper.run(rx));

        time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let stored = h.job(job.id).await;
        assert_eq!(stored.running_status, RunningStatus::Completed);
        assert_eq!(stored.completion_status, Some(CompletionStatus::TimedOut));
    }
}
