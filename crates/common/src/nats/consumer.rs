use crate::domain::HandlerOutcome;
use crate::nats::CORRELATION_ID_HEADER;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer};
use bytes::Bytes;
use futures::{future::BoxFuture, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Handler for one inbound feedback message: payload plus the correlation id
/// extracted from the message headers (absent when the header is missing).
pub type MessageHandler =
    Box<dyn Fn(Bytes, Option<String>) -> BoxFuture<'static, HandlerOutcome> + Send + Sync>;

/// Durable pull consumer for one feedback queue.
///
/// Acknowledgement discipline: every message is acked after its handler
/// returns, whatever the outcome. There is no nak/requeue path; a feedback
/// message gets exactly one processing attempt, and malformed or stale
/// messages are dropped rather than retried.
pub struct QueueConsumer {
    consumer: PullConsumer,
    batch_size: usize,
    max_wait: Duration,
    handler: MessageHandler,
}

impl QueueConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait: Duration,
        handler: MessageHandler,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "creating feedback consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "feedback consumer ready"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait,
            handler,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("starting feedback consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("shutdown signal received, stopping consumer");
                    break;
                }
                result = self.fetch_and_process() => {
                    if let Err(e) = result {
                        error!(error = %e, "error processing feedback batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("feedback consumer stopped");
        Ok(())
    }

    async fn fetch_and_process(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        while let Some(next) = messages.next().await {
            let message = match next {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "error receiving message from batch");
                    continue;
                }
            };

            let correlation_id = message
                .headers
                .as_ref()
                .and_then(|headers| headers.get(CORRELATION_ID_HEADER))
                .map(|value| value.as_str().to_string())
                .filter(|value| !value.is_empty());

            let outcome = (self.handler)(message.payload.clone(), correlation_id).await;
            match outcome {
                HandlerOutcome::Applied => debug!(subject = %message.subject, "feedback applied"),
                HandlerOutcome::Stale => debug!(subject = %message.subject, "stale feedback ignored"),
                HandlerOutcome::DroppedInvalid => {
                    warn!(subject = %message.subject, "invalid feedback dropped")
                }
                HandlerOutcome::ErrorLogged => {
                    warn!(subject = %message.subject, "feedback handler reported an error")
                }
            }

            // Ack regardless of outcome; feedback is never requeued.
            if let Err(e) = message.ack().await {
                error!(error = %e, subject = %message.subject, "failed to acknowledge message");
            }
        }

        Ok(())
    }
}
