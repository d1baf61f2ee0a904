use crate::domain::GenerationMessageProducer;
use async_trait::async_trait;
use bytes::Bytes;
use common::domain::{DomainError, DomainResult, GenerationMessage, MessageDispatch};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Publishes generation requests to the generation pipeline's queue.
pub struct NatsGenerationProducer {
    dispatch: Arc<dyn MessageDispatch>,
    queue: String,
}

impl NatsGenerationProducer {
    pub fn new(dispatch: Arc<dyn MessageDispatch>, queue: impl Into<String>) -> Self {
        Self {
            dispatch,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl GenerationMessageProducer for NatsGenerationProducer {
    #[instrument(skip(self, message), fields(bundle_id = %message.id, queue = %self.queue))]
    async fn publish_generation_request(
        &self,
        message: &GenerationMessage,
        correlation_id: &str,
    ) -> DomainResult<()> {
        let payload =
            serde_json::to_vec(message).map_err(|e| DomainError::DispatchError(e.to_string()))?;

        self.dispatch
            .publish(&self.queue, Bytes::from(payload), correlation_id)
            .await?;

        debug!("generation request published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MockMessageDispatch;
    use uuid::Uuid;

    #[tokio::test]
    async fn publishes_serialized_message_with_correlation_header() {
        let mut dispatch = MockMessageDispatch::new();
        dispatch
            .expect_publish()
            .withf(|queue: &str, payload: &Bytes, corr: &str| {
                let parsed: GenerationMessage = serde_json::from_slice(payload).unwrap();
                queue == "bundlegen.requests" && parsed.encrypt && corr == "req-1"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let producer = NatsGenerationProducer::new(Arc::new(dispatch), "bundlegen.requests");
        producer
            .publish_generation_request(
                &GenerationMessage {
                    id: Uuid::new_v4(),
                    application_id: "com.example.weather".to_string(),
                    application_version: "1.0.0".to_string(),
                    platform_name: "stb".to_string(),
                    firmware_version: "fw-1".to_string(),
                    oci_image_url: "oci://registry/weather:1.0.0".to_string(),
                    encrypt: true,
                },
                "req-1",
            )
            .await
            .unwrap();
    }
}
