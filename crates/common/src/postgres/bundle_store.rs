use crate::domain::{
    Bundle, BundleCoordinates, BundleStatus, BundleStore, DomainError, DomainResult,
};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

const BUNDLE_COLUMNS: &str = "id, application_id, application_version, platform_name, \
     firmware_version, status, correlation_id, message_timestamp, created_at, updated_at";

/// PostgreSQL implementation of the `BundleStore` contract.
///
/// The conditional update is a single `UPDATE ... WHERE message_timestamp < $n`
/// statement, so the newer-timestamp check and the write are one atomic
/// row-level operation; concurrent feedback for the same bundle cannot
/// interleave a read-modify-write.
#[derive(Clone)]
pub struct PostgresBundleStore {
    client: PostgresClient,
}

impl PostgresBundleStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    fn bundle_from_row(row: &Row) -> DomainResult<Bundle> {
        let status: String = row.get(5);
        let status = BundleStatus::from_phase_code(&status)
            .ok_or_else(|| DomainError::RepositoryError(anyhow!("unknown stored status: {status}")))?;

        Ok(Bundle {
            id: row.get(0),
            coordinates: BundleCoordinates {
                application_id: row.get(1),
                application_version: row.get(2),
                platform_name: row.get(3),
                firmware_version: row.get(4),
            },
            status,
            correlation_id: row.get(6),
            message_timestamp: row.get(7),
            created_at: row.get(8),
            updated_at: row.get(9),
        })
    }
}

#[async_trait]
impl BundleStore for PostgresBundleStore {
    #[instrument(skip(self, coordinates), fields(coordinates = %coordinates))]
    async fn get_latest(&self, coordinates: &BundleCoordinates) -> DomainResult<Option<Bundle>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {BUNDLE_COLUMNS}
             FROM bundle
             WHERE application_id = $1
               AND application_version = $2
               AND platform_name = $3
               AND firmware_version = $4
             ORDER BY COALESCE(updated_at, created_at) DESC
             LIMIT 1"
        );
        let row = conn
            .query_opt(
                query.as_str(),
                &[
                    &coordinates.application_id,
                    &coordinates.application_version,
                    &coordinates.platform_name,
                    &coordinates.firmware_version,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(Self::bundle_from_row).transpose()
    }

    #[instrument(skip(self), fields(bundle_id = %id))]
    async fn get(&self, id: Uuid) -> DomainResult<Option<Bundle>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!("SELECT {BUNDLE_COLUMNS} FROM bundle WHERE id = $1");
        let row = conn
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(Self::bundle_from_row).transpose()
    }

    #[instrument(skip(self, bundle), fields(bundle_id = %bundle.id, status = %bundle.status))]
    async fn insert(&self, bundle: &Bundle) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let created_at: DateTime<Utc> = Utc::now();
        let result = conn
            .execute(
                "INSERT INTO bundle (id, application_id, application_version, platform_name,
                     firmware_version, status, correlation_id, message_timestamp, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &bundle.id,
                    &bundle.coordinates.application_id,
                    &bundle.coordinates.application_version,
                    &bundle.coordinates.platform_name,
                    &bundle.coordinates.firmware_version,
                    &bundle.status.as_str(),
                    &bundle.correlation_id,
                    &bundle.message_timestamp,
                    &created_at,
                ],
            )
            .await;

        if let Err(e) = result {
            // 23505 = unique_violation
            if let Some(db_err) = e.as_db_error() {
                if db_err.code().code() == "23505" {
                    return Err(DomainError::BundleAlreadyExists(bundle.id));
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        debug!("inserted bundle row");
        Ok(())
    }

    #[instrument(skip(self), fields(bundle_id = %id, status = %status))]
    async fn update_if_newer(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let updated_at: DateTime<Utc> = Utc::now();
        let updated = conn
            .execute(
                "UPDATE bundle
                 SET status = $2, updated_at = $3, message_timestamp = $4
                 WHERE id = $1 AND message_timestamp < $4",
                &[&id, &status.as_str(), &updated_at, &message_timestamp],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(updated > 0)
    }

    #[instrument(skip(self), fields(bundle_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let updated_at: DateTime<Utc> = Utc::now();
        conn.execute(
            "UPDATE bundle
             SET status = $2, updated_at = $3, message_timestamp = $4
             WHERE id = $1",
            &[&id, &status.as_str(), &updated_at, &message_timestamp],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(())
    }
}
