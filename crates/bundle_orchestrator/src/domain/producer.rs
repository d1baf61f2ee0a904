use async_trait::async_trait;
use common::domain::{DomainResult, EncryptionMessage, GenerationMessage};

/// Publishes generation requests to the generation pipeline.
///
/// Transport failure is the `Err` value; the caller compensates the bundle
/// row before re-raising.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GenerationMessageProducer: Send + Sync {
    async fn publish_generation_request(
        &self,
        message: &GenerationMessage,
        correlation_id: &str,
    ) -> DomainResult<()>;
}

/// Publishes encryption requests to the encryption pipeline.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EncryptionMessageProducer: Send + Sync {
    async fn publish_encryption_request(
        &self,
        message: &EncryptionMessage,
        correlation_id: &str,
    ) -> DomainResult<()>;
}
