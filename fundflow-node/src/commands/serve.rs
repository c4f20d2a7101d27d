//! Serve command
//!
//! Runs job management and both workers in one process over the in-memory
//! bus until Ctrl-C.

use anyhow::{Context, Result};
use clap::Args;
use fundflow_core::messaging::{InMemoryBus, Message, MessageSender, ResilientMessageSender};
use fundflow_core::resilience::ResiliencePolicy;
use fundflow_orchestrator::repository::{
    InMemoryJobStore, ResilientJobStore, ResilientNotificationChannel, StaticJobDefinitionRegistry,
    TopicNotificationChannel,
};
use fundflow_orchestrator::scheduler::{CompletionListener, JobRequestListener, TimeoutSweeper};
use fundflow_orchestrator::JobService;
use fundflow_runner::dataset::{
    DatasetPipeline, DatasetRepositories, InMemoryDatasetStore, InMemoryProviderRepository,
    InMemoryProviderSourceDatasetRepository,
};
use fundflow_runner::engine::repository::{
    InMemoryCalculationRepository, InMemoryProviderResultRepository,
};
use fundflow_runner::engine::{CalculationEngine, StaticModelLoader};
use fundflow_runner::worker::{CalculationJobHandler, DatasetJobHandler, QueueWorker};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::config::NodeConfig;
use crate::seed::Seed;

#[derive(Args)]
pub struct ServeArgs {
    /// JSON file of job definitions (built-in set when omitted)
    #[arg(long, env = "JOB_DEFINITIONS_PATH")]
    definitions: Option<PathBuf>,

    /// JSON file of allocation models keyed by specification id
    #[arg(long, env = "ALLOCATION_MODELS_PATH")]
    models: Option<PathBuf>,

    /// JSON file of seed data for the in-memory stores
    #[arg(long, env = "SEED_PATH")]
    seed: Option<PathBuf>,
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = NodeConfig::from_env();
    if args.definitions.is_some() {
        config.orchestrator.job_definitions_path = args.definitions.clone();
    }
    config.validate().context("Invalid configuration")?;

    let registry = match &config.orchestrator.job_definitions_path {
        Some(path) => StaticJobDefinitionRegistry::from_json_file(path)?,
        None => StaticJobDefinitionRegistry::builtin(),
    };
    info!("Loaded {} job definition(s)", registry.definitions().len());

    let loader = match &args.models {
        Some(path) => StaticModelLoader::from_json_file(path)?,
        None => StaticModelLoader::new(),
    };
    info!("Loaded allocation models for {} specification(s)", loader.len());

    let seed = match &args.seed {
        Some(path) => Seed::from_json_file(path)?,
        None => Seed::default(),
    };

    // Bus
    let bus = InMemoryBus::new();
    let sender: Arc<dyn MessageSender> = Arc::new(ResilientMessageSender::new(
        Arc::new(bus.clone()),
        ResiliencePolicy::new("messaging", config.orchestrator.messaging_policy.clone()),
    ));
    let notifications_rx =
        take(bus.take_topic_receiver(&config.orchestrator.notification_topic))?;
    let requests_rx = take(bus.take_queue_receiver(&config.orchestrator.job_request_queue))?;
    let calculation_rx = take(bus.take_queue_receiver(&config.runner.calculation_queue))?;
    let dataset_rx = take(bus.take_queue_receiver(&config.runner.dataset_queue))?;

    // Job management
    let store = Arc::new(ResilientJobStore::new(
        Arc::new(InMemoryJobStore::new()),
        ResiliencePolicy::new("job-store", config.orchestrator.job_store_policy.clone()),
    ));
    let notifications = notification_channel(
        Arc::new(bus.clone()),
        &config.orchestrator.notification_topic,
        ResiliencePolicy::new("notifications", config.orchestrator.notification_policy.clone()),
    );
    let service = Arc::new(JobService::new(
        store,
        Arc::new(registry),
        notifications,
        sender.clone(),
    ));

    // Stores
    let dataset_store = Arc::new(InMemoryDatasetStore::new());
    let calculations = Arc::new(InMemoryCalculationRepository::new());
    let providers = Arc::new(InMemoryProviderRepository::new(seed.providers.clone()));
    let sources = Arc::new(InMemoryProviderSourceDatasetRepository::new());
    let results = Arc::new(InMemoryProviderResultRepository::new());
    seed.apply(&dataset_store, &calculations).await;

    // Workers
    let repository_policy =
        ResiliencePolicy::new("repositories", config.runner.repository_policy.clone());
    let engine = Arc::new(CalculationEngine::new(
        Arc::new(loader),
        calculations,
        repository_policy.clone(),
        config.runner.engine.clone(),
    ));
    let pipeline = Arc::new(DatasetPipeline::new(
        DatasetRepositories {
            definitions: dataset_store.clone(),
            build_projects: dataset_store.clone(),
            tables: dataset_store.clone(),
            providers: providers.clone(),
            sources: sources.clone(),
        },
        sender.clone(),
        repository_policy.clone(),
        config.runner.dataset.clone(),
    ));

    let calculation_worker = QueueWorker::new(
        config.runner.calculation_queue.clone(),
        calculation_rx,
        Arc::new(CalculationJobHandler::new(
            engine,
            dataset_store.clone(),
            providers,
            sources,
            results,
            repository_policy,
        )),
        service.clone(),
        config.runner.max_parallel_jobs,
    );
    let dataset_worker = QueueWorker::new(
        config.runner.dataset_queue.clone(),
        dataset_rx,
        Arc::new(DatasetJobHandler::new(pipeline)),
        service.clone(),
        config.runner.max_parallel_jobs,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let tasks = vec![
        tokio::spawn(
            TimeoutSweeper::new(service.clone(), config.orchestrator.timeout_sweep_interval)
                .run(shutdown_rx.clone()),
        ),
        tokio::spawn(
            CompletionListener::new(service.clone(), notifications_rx).run(shutdown_rx.clone()),
        ),
        tokio::spawn(
            JobRequestListener::new(service.clone(), requests_rx).run(shutdown_rx.clone()),
        ),
        tokio::spawn(calculation_worker.run(shutdown_rx.clone())),
        tokio::spawn(dataset_worker.run(shutdown_rx)),
    ];

    info!("Node started, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        task.await.context("Background task panicked")?;
    }

    info!("Node stopped");
    Ok(())
}

/// Publishes job notifications straight onto `transport`; `policy` is the
/// only retry layer in front of it.
fn notification_channel(
    transport: Arc<dyn MessageSender>,
    topic: &str,
    policy: ResiliencePolicy,
) -> Arc<ResilientNotificationChannel> {
    Arc::new(ResilientNotificationChannel::new(
        Arc::new(TopicNotificationChannel::new(transport, topic)),
        policy,
    ))
}

fn take(
    receiver: Option<mpsc::UnboundedReceiver<Message>>,
) -> Result<mpsc::UnboundedReceiver<Message>> {
    receiver.context("Bus consumer already taken")
}
