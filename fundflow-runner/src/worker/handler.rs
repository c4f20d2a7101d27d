use async_trait::async_trait;
use fundflow_core::messaging::Message;

/// Counters and summary of one handled job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub items_processed: i32,
    pub items_succeeded: i32,
    pub items_failed: i32,
    pub summary: String,
}

impl HandlerOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_counts(mut self, processed: usize, succeeded: usize, failed: usize) -> Self {
        self.items_processed = saturate(processed);
        self.items_succeeded = saturate(succeeded);
        self.items_failed = saturate(failed);
        self
    }
}

fn saturate(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Does the work carried by one queue message
///
/// An `Err` completes the job as Failed with the error chain as outcome.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &Message) -> anyhow::Result<HandlerOutcome>;
}
