use crate::domain::BundleCoordinates;
use crate::resilience::{ClassifyFailure, FailureKind};
use async_trait::async_trait;
use thiserror::Error;

/// Metadata resolved for a set of bundle coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationMetadata {
    pub oci_image_url: String,
}

#[derive(Error, Debug)]
pub enum LookupError {
    /// The coordinates do not resolve to a known application. A normal
    /// outcome, exempt from circuit-breaker failure accounting.
    #[error("application not found for {0}")]
    NotFound(String),

    #[error("metadata service transport failure: {0}")]
    Transport(String),

    #[error("metadata service returned status {status}")]
    RemoteStatus { status: u16 },

    #[error("metadata service response could not be decoded: {0}")]
    Decode(String),
}

impl ClassifyFailure for LookupError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            LookupError::NotFound(_) => FailureKind::NotFound,
            LookupError::Transport(_) => FailureKind::Transport,
            LookupError::RemoteStatus { .. } => FailureKind::RemoteStatus,
            LookupError::Decode(_) => FailureKind::Internal,
        }
    }
}

/// External metadata lookup, always invoked through the resilient invoker.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(
        &self,
        coordinates: &BundleCoordinates,
    ) -> Result<ApplicationMetadata, LookupError>;
}
