use crate::domain::EncryptionMessageProducer;
use async_trait::async_trait;
use bytes::Bytes;
use common::domain::{DomainError, DomainResult, EncryptionMessage, MessageDispatch};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Publishes encryption requests to the encryption pipeline's queue.
pub struct NatsEncryptionProducer {
    dispatch: Arc<dyn MessageDispatch>,
    queue: String,
}

impl NatsEncryptionProducer {
    pub fn new(dispatch: Arc<dyn MessageDispatch>, queue: impl Into<String>) -> Self {
        Self {
            dispatch,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl EncryptionMessageProducer for NatsEncryptionProducer {
    #[instrument(skip(self, message), fields(bundle_id = %message.id, queue = %self.queue))]
    async fn publish_encryption_request(
        &self,
        message: &EncryptionMessage,
        correlation_id: &str,
    ) -> DomainResult<()> {
        let payload =
            serde_json::to_vec(message).map_err(|e| DomainError::DispatchError(e.to_string()))?;

        self.dispatch
            .publish(&self.queue, Bytes::from(payload), correlation_id)
            .await?;

        debug!("encryption request published");
        Ok(())
    }
}
