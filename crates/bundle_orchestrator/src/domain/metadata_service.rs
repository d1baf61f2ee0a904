use common::domain::{
    ApplicationMetadata, BundleCoordinates, DomainError, DomainResult, LookupError, MetadataLookup,
};
use common::resilience::{InvokerError, ResilientInvoker};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Resolves application metadata through the resilient invoker guarding the
/// metadata service.
///
/// `Ok(None)` means the coordinates do not resolve, a normal outcome the
/// boundary turns into its not-found response. Rejections (open circuit,
/// full bulkhead) and real lookup failures surface as
/// `DomainError::MetadataUnavailable`.
pub struct ApplicationMetadataService {
    lookup: Arc<dyn MetadataLookup>,
    invoker: Arc<ResilientInvoker>,
}

impl ApplicationMetadataService {
    pub fn new(lookup: Arc<dyn MetadataLookup>, invoker: Arc<ResilientInvoker>) -> Self {
        Self { lookup, invoker }
    }

    #[instrument(skip(self, coordinates), fields(coordinates = %coordinates))]
    pub async fn resolve_artifact(
        &self,
        coordinates: &BundleCoordinates,
    ) -> DomainResult<Option<ApplicationMetadata>> {
        info!("requesting application metadata");

        let result = self
            .invoker
            .invoke(|| self.lookup.lookup(coordinates))
            .await;

        match result {
            Ok(metadata) => Ok(Some(metadata)),
            Err(InvokerError::Inner(LookupError::NotFound(_))) => Ok(None),
            Err(InvokerError::Inner(error)) => {
                warn!(error = %error, "metadata lookup failed");
                Err(DomainError::MetadataUnavailable(error.to_string()))
            }
            Err(InvokerError::Rejected(rejection)) => {
                warn!(rejection = %rejection, "metadata lookup rejected by admission pipeline");
                Err(DomainError::MetadataUnavailable(rejection.to_string()))
            }
        }
    }
}
