use crate::domain::{DomainError, DomainResult, MessageDispatch};
use crate::nats::CORRELATION_ID_HEADER;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{instrument, warn};

/// JetStream-backed implementation of the dispatch contract.
///
/// A transport failure comes back as `DomainError::DispatchError`; the
/// orchestrator reacts by compensating the affected bundle row. The
/// publish is only considered successful once the broker acknowledges it.
pub struct NatsMessageDispatch {
    jetstream: jetstream::Context,
}

impl NatsMessageDispatch {
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self { jetstream }
    }
}

#[async_trait]
impl MessageDispatch for NatsMessageDispatch {
    #[instrument(skip(self, payload), fields(queue = %queue, correlation_id = %correlation_id, payload_size = payload.len()))]
    async fn publish(&self, queue: &str, payload: Bytes, correlation_id: &str) -> DomainResult<()> {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, correlation_id);

        let ack = self
            .jetstream
            .publish_with_headers(queue.to_string(), headers, payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "publish failed");
                DomainError::DispatchError(e.to_string())
            })?;

        ack.await.map_err(|e| {
            warn!(error = %e, "broker did not acknowledge publish");
            DomainError::DispatchError(e.to_string())
        })?;

        Ok(())
    }
}
