mod config;

use anyhow::Result;
use bundle_orchestrator::{BundleOrchestrator, BundleOrchestratorConfig};
use common::nats::NatsClient;
use common::postgres::{PostgresBundleStore, PostgresClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let config = match config::ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("starting bundle service");

    if let Err(e) = run(config).await {
        error!(error = %e, "bundle service failed");
        std::process::exit(1);
    }
}

async fn run(config: config::ServiceConfig) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    let postgres = PostgresClient::new(&config.postgres_settings())?;
    tokio::time::timeout(startup_timeout, postgres.ping()).await??;

    let nats = Arc::new(NatsClient::connect(&config.nats_url, startup_timeout).await?);
    nats.ensure_stream(
        &config.feedback_stream,
        vec![
            config.generation_status_queue.clone(),
            config.encryption_status_queue.clone(),
        ],
    )
    .await?;
    nats.ensure_stream(
        &config.request_stream,
        vec![
            config.generation_request_queue.clone(),
            config.encryption_request_queue.clone(),
        ],
    )
    .await?;

    let store = Arc::new(PostgresBundleStore::new(postgres));
    let orchestrator = BundleOrchestrator::new(
        store,
        Arc::clone(&nats),
        BundleOrchestratorConfig {
            feedback_stream: config.feedback_stream.clone(),
            generation_status_queue: config.generation_status_queue.clone(),
            encryption_status_queue: config.encryption_status_queue.clone(),
            generation_request_queue: config.generation_request_queue.clone(),
            encryption_request_queue: config.encryption_request_queue.clone(),
            consumer_batch_size: config.consumer_batch_size,
            consumer_max_wait: Duration::from_secs(config.consumer_max_wait_secs),
            encryption_enabled: config.encryption_enabled,
            environment: config.environment.clone(),
            bundle_extension: config.bundle_extension.clone(),
        },
    )
    .await?;

    let ctx = CancellationToken::new();
    let mut tasks = Vec::new();
    for process in orchestrator.into_runner_processes() {
        let token = ctx.clone();
        tasks.push(tokio::spawn(async move { process(token).await }));
    }

    info!("bundle service running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    ctx.cancel();

    for task in tasks {
        if let Err(e) = task.await? {
            error!(error = %e, "consumer ended with error");
        }
    }

    info!("bundle service stopped");
    Ok(())
}
