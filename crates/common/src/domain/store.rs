use crate::domain::{Bundle, BundleCoordinates, BundleStatus, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence contract for bundle rows.
///
/// `update_if_newer` is the concurrency anchor of the whole service: it must
/// be a single conditional write, atomic per row, so that replayed or
/// reordered feedback degrades to a no-op instead of corrupting state.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Most recent row for the coordinates, ordered by the greater of
    /// (updated_at, created_at). At most one row is returned.
    async fn get_latest(&self, coordinates: &BundleCoordinates) -> DomainResult<Option<Bundle>>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Bundle>>;

    /// Insert a new row. Fails with `DomainError::BundleAlreadyExists` if the
    /// id is already present.
    async fn insert(&self, bundle: &Bundle) -> DomainResult<()>;

    /// Conditional update: applies iff `message_timestamp` is strictly
    /// greater than the stored one. Returns whether the row was updated.
    async fn update_if_newer(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Unconditional status write, used only for error compensation.
    async fn update_status(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<()>;
}
