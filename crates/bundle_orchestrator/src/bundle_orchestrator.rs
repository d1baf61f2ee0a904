use crate::domain::{BundleService, EncryptionMessageFactory};
use crate::nats::{FeedbackPipeline, FeedbackProcessor, NatsEncryptionProducer, NatsGenerationProducer};
use common::domain::{BundleStore, MessageDispatch};
use common::nats::{NatsClient, NatsMessageDispatch, QueueConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct BundleOrchestratorConfig {
    /// Stream holding both feedback queues.
    pub feedback_stream: String,
    pub generation_status_queue: String,
    pub encryption_status_queue: String,
    pub generation_request_queue: String,
    pub encryption_request_queue: String,
    pub consumer_batch_size: usize,
    pub consumer_max_wait: Duration,
    /// Global switch for the generation → encryption cross-phase trigger.
    pub encryption_enabled: bool,
    pub environment: String,
    pub bundle_extension: String,
}

/// Wires the bundle service to its feedback consumers and request producers.
pub struct BundleOrchestrator {
    service: Arc<BundleService>,
    generation_consumer: QueueConsumer,
    encryption_consumer: QueueConsumer,
}

impl BundleOrchestrator {
    pub async fn new(
        store: Arc<dyn BundleStore>,
        nats_client: Arc<NatsClient>,
        config: BundleOrchestratorConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing bundle orchestrator");

        let dispatch: Arc<dyn MessageDispatch> =
            Arc::new(NatsMessageDispatch::new(nats_client.jetstream().clone()));

        let service = Arc::new(BundleService::new(
            store,
            Arc::new(NatsGenerationProducer::new(
                Arc::clone(&dispatch),
                config.generation_request_queue.clone(),
            )),
            Arc::new(NatsEncryptionProducer::new(
                Arc::clone(&dispatch),
                config.encryption_request_queue.clone(),
            )),
            EncryptionMessageFactory::new(config.environment.clone(), config.bundle_extension.clone()),
        ));

        let generation_processor = Arc::new(FeedbackProcessor::new(
            Arc::clone(&service),
            FeedbackPipeline::Generation,
            config.encryption_enabled,
        ));
        let generation_consumer = QueueConsumer::new(
            nats_client.jetstream(),
            &config.feedback_stream,
            "bundle-service-generation-status",
            &config.generation_status_queue,
            config.consumer_batch_size,
            config.consumer_max_wait,
            generation_processor.into_handler(),
        )
        .await?;

        let encryption_processor = Arc::new(FeedbackProcessor::new(
            Arc::clone(&service),
            FeedbackPipeline::Encryption,
            config.encryption_enabled,
        ));
        let encryption_consumer = QueueConsumer::new(
            nats_client.jetstream(),
            &config.feedback_stream,
            "bundle-service-encryption-status",
            &config.encryption_status_queue,
            config.consumer_batch_size,
            config.consumer_max_wait,
            encryption_processor.into_handler(),
        )
        .await?;

        info!("bundle orchestrator initialized");

        Ok(Self {
            service,
            generation_consumer,
            encryption_consumer,
        })
    }

    /// The domain service, for the request boundary.
    pub fn bundle_service(&self) -> Arc<BundleService> {
        Arc::clone(&self.service)
    }

    /// Hand both consumer loops to the runtime.
    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        vec![
            Box::new({
                let consumer = self.generation_consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
            Box::new({
                let consumer = self.encryption_consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
        ]
    }
}
