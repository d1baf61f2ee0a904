use crate::domain::BundleService;
use bytes::Bytes;
use common::domain::{BundleStatus, FeedbackMessage, HandlerOutcome};
use common::nats::MessageHandler;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which worker pipeline a feedback queue belongs to. Only the generation
/// pipeline cross-triggers encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackPipeline {
    Generation,
    Encryption,
}

/// Validates and routes one feedback message to the bundle service.
///
/// Validation failures (missing correlation id, undecodable body, missing
/// timestamp, unknown phase code) drop the message; it is still acknowledged
/// by the consumer, never retried or escalated.
pub struct FeedbackProcessor {
    service: Arc<BundleService>,
    pipeline: FeedbackPipeline,
    encryption_enabled: bool,
}

impl FeedbackProcessor {
    pub fn new(
        service: Arc<BundleService>,
        pipeline: FeedbackPipeline,
        encryption_enabled: bool,
    ) -> Self {
        Self {
            service,
            pipeline,
            encryption_enabled,
        }
    }

    pub async fn process(&self, payload: &[u8], correlation_id: Option<String>) -> HandlerOutcome {
        let Some(correlation_id) = correlation_id.filter(|id| !id.is_empty()) else {
            warn!("received message does not have an 'x-request-id', cannot be processed");
            return HandlerOutcome::DroppedInvalid;
        };

        let message: FeedbackMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "received message cannot be parsed as feedback"
                );
                return HandlerOutcome::DroppedInvalid;
            }
        };

        match &message.error {
            Some(error) => warn!(
                correlation_id = %correlation_id,
                bundle_id = %message.id,
                code = %error.code,
                message = %error.message,
                "feedback reports a pipeline error"
            ),
            None => info!(
                correlation_id = %correlation_id,
                bundle_id = %message.id,
                phase_code = %message.phase_code,
                "received feedback"
            ),
        }

        let Some(message_timestamp) = message.message_timestamp else {
            warn!(
                correlation_id = %correlation_id,
                bundle_id = %message.id,
                "message does not have a 'messageTimestamp', cannot be processed"
            );
            return HandlerOutcome::DroppedInvalid;
        };

        let Some(status) = BundleStatus::from_phase_code(&message.phase_code) else {
            warn!(
                correlation_id = %correlation_id,
                bundle_id = %message.id,
                phase_code = %message.phase_code,
                "message does not have a valid 'phaseCode', cannot be processed"
            );
            return HandlerOutcome::DroppedInvalid;
        };

        let applied = match self
            .service
            .apply_feedback(message.id, status, message_timestamp)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    bundle_id = %message.id,
                    error = %e,
                    "failed to apply feedback"
                );
                return HandlerOutcome::ErrorLogged;
            }
        };

        if !applied {
            return HandlerOutcome::Stale;
        }

        // Sole cross-phase linkage between the two pipelines: a freshly
        // completed generation hands the bundle to encryption.
        if self.pipeline == FeedbackPipeline::Generation
            && status == BundleStatus::GenerationCompleted
            && self.encryption_enabled
        {
            if let Err(e) = self
                .service
                .trigger_encryption(message.id, &correlation_id)
                .await
            {
                error!(
                    correlation_id = %correlation_id,
                    bundle_id = %message.id,
                    error = %e,
                    "failed to trigger encryption"
                );
                return HandlerOutcome::ErrorLogged;
            }
        }

        HandlerOutcome::Applied
    }

    /// Adapt this processor into the consumer's handler shape.
    pub fn into_handler(self: Arc<Self>) -> MessageHandler {
        Box::new(move |payload: Bytes, correlation_id: Option<String>| {
            let processor = Arc::clone(&self);
            Box::pin(async move { processor.process(&payload, correlation_id).await })
        })
    }
}
