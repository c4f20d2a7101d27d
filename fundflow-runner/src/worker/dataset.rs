//! Dataset mapping job handler

use anyhow::Context;
use async_trait::async_trait;
use fundflow_core::dto::dataset::DatasetProcessRequest;
use fundflow_core::messaging::{Message, properties};
use std::sync::Arc;

use super::handler::{HandlerOutcome, JobHandler};
use crate::dataset::DatasetPipeline;

pub struct DatasetJobHandler {
    pipeline: Arc<DatasetPipeline>,
}

impl DatasetJobHandler {
    pub fn new(pipeline: Arc<DatasetPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobHandler for DatasetJobHandler {
    fn name(&self) -> &'static str {
        "dataset"
    }

    async fn handle(&self, message: &Message) -> anyhow::Result<HandlerOutcome> {
        let request: DatasetProcessRequest = message
            .body_as()
            .context("invalid dataset process request")?;

        let summary = self
            .pipeline
            .process_dataset(&request, message.property(properties::CORRELATION_ID))
            .await
            .with_context(|| format!("failed to process dataset {}", request.dataset.id))?;

        let matched = summary.rows_processed - summary.rows_unmatched;

        Ok(HandlerOutcome::new(format!(
            "Mapped {} row(s) to {} provider(s), {} new version(s)",
            matched, summary.providers_matched, summary.versions_created
        ))
        .with_counts(summary.rows_processed, matched, summary.rows_unmatched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::{EXTRA, PipelineFixture, request, row};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_handles_request_body() {
        let fx = PipelineFixture::new().await;
        fx.upload(1, vec![row("100001", 20), row("100002", 7), row("555555", 1)])
            .await;
        let handler = DatasetJobHandler::new(fx.pipeline.clone());

        let message = Message::json(&request(EXTRA, 1), HashMap::new()).unwrap();
        let outcome = handler.handle(&message).await.unwrap();

        assert_eq!(outcome.items_processed, 3);
        assert_eq!(outcome.items_succeeded, 2);
        assert_eq!(outcome.items_failed, 1);
        assert!(outcome.summary.contains("2 new version(s)"));
    }

    #[tokio::test]
    async fn test_invalid_body_fails() {
        let fx = PipelineFixture::new().await;
        let handler = DatasetJobHandler::new(fx.pipeline.clone());

        let err = handler
            .handle(&Message::new("not json", HashMap::new()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("invalid dataset process request"));
    }
}
