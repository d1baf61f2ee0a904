use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Bundle already exists: {0}")]
    BundleAlreadyExists(uuid::Uuid),

    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Application metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Message dispatch failed: {0}")]
    DispatchError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
