use crate::domain::{EncryptionMessageFactory, EncryptionMessageProducer, GenerationMessageProducer};
use chrono::{DateTime, Utc};
use common::domain::{
    Bundle, BundleContext, BundleCoordinates, BundleStatus, BundleStore, DomainResult,
    GenerationMessage,
};
use common::garde::validate_struct;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of a generation request.
#[derive(Debug, Clone)]
pub enum GenerationRequestOutcome {
    /// A new bundle row was created and the generation request published.
    Started(Bundle),
    /// The latest row for the coordinates is already in flight (or done);
    /// no new row was created. Carries the existing row so the boundary can
    /// answer with a retry hint.
    AlreadyInFlight(Bundle),
}

/// Drives a bundle through its generation and encryption phases.
///
/// Feedback delivery is at-least-once and unordered, so every status write
/// driven by feedback goes through the store's timestamp-conditional update:
/// stale or replayed messages degrade to no-ops without any locking.
pub struct BundleService {
    store: Arc<dyn BundleStore>,
    generation_producer: Arc<dyn GenerationMessageProducer>,
    encryption_producer: Arc<dyn EncryptionMessageProducer>,
    encryption_factory: EncryptionMessageFactory,
}

impl BundleService {
    pub fn new(
        store: Arc<dyn BundleStore>,
        generation_producer: Arc<dyn GenerationMessageProducer>,
        encryption_producer: Arc<dyn EncryptionMessageProducer>,
        encryption_factory: EncryptionMessageFactory,
    ) -> Self {
        Self {
            store,
            generation_producer,
            encryption_producer,
            encryption_factory,
        }
    }

    /// Start a generation cycle for the coordinates.
    ///
    /// If the latest row for the coordinates is in any status other than
    /// `BUNDLE_ERROR`, the work is already in flight or finished and no new
    /// row is created. Otherwise a fresh row is inserted with
    /// `GENERATION_REQUESTED` and the generation request published; a publish
    /// failure compensates the row to `BUNDLE_ERROR` and is re-raised so the
    /// caller sees the failed attempt.
    #[instrument(skip(self, coordinates, artifact_url), fields(coordinates = %coordinates, correlation_id = %correlation_id))]
    pub async fn request_generation(
        &self,
        coordinates: BundleCoordinates,
        correlation_id: &str,
        artifact_url: &str,
        encrypt: bool,
    ) -> DomainResult<GenerationRequestOutcome> {
        validate_struct(&coordinates)?;

        if let Some(existing) = self.store.get_latest(&coordinates).await? {
            if existing.status != BundleStatus::BundleError {
                info!(
                    bundle_id = %existing.id,
                    status = %existing.status,
                    "bundle already in flight, skipping generation"
                );
                return Ok(GenerationRequestOutcome::AlreadyInFlight(existing));
            }
        }

        let bundle = Bundle::new(
            Uuid::new_v4(),
            coordinates,
            BundleStatus::GenerationRequested,
            correlation_id,
            Utc::now(),
        );
        info!(bundle_id = %bundle.id, "starting a new bundle generation");
        self.store.insert(&bundle).await?;

        let context = BundleContext {
            bundle,
            artifact_url: artifact_url.to_string(),
            encrypt,
        };
        let message = GenerationMessage {
            id: context.bundle.id,
            application_id: context.bundle.coordinates.application_id.clone(),
            application_version: context.bundle.coordinates.application_version.clone(),
            platform_name: context.bundle.coordinates.platform_name.clone(),
            firmware_version: context.bundle.coordinates.firmware_version.clone(),
            oci_image_url: context.artifact_url.clone(),
            encrypt: context.encrypt,
        };

        if let Err(publish_error) = self
            .generation_producer
            .publish_generation_request(&message, correlation_id)
            .await
        {
            self.compensate(context.bundle.id, context.bundle.message_timestamp)
                .await;
            return Err(publish_error);
        }

        Ok(GenerationRequestOutcome::Started(context.bundle))
    }

    /// Latest row for the coordinates, by the greater of
    /// (updated_at, created_at).
    pub async fn get_latest_bundle(
        &self,
        coordinates: &BundleCoordinates,
    ) -> DomainResult<Option<Bundle>> {
        self.store.get_latest(coordinates).await
    }

    /// Conditionally advance a bundle from feedback. Applies iff the message
    /// timestamp is strictly newer than the stored one; returns whether it
    /// applied. Non-application is not an error.
    #[instrument(skip(self), fields(bundle_id = %id, status = %status))]
    pub async fn apply_feedback(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let applied = self
            .store
            .update_if_newer(id, status, message_timestamp)
            .await?;
        if applied {
            info!("bundle status updated");
        }
        Ok(applied)
    }

    /// Hand a completed bundle to the encryption pipeline.
    ///
    /// A message referencing an unknown (purged) bundle is dropped, not
    /// retried. Otherwise the row moves to `ENCRYPTION_REQUESTED` with a
    /// fresh timestamp and the encryption request is published; a publish
    /// failure compensates to `BUNDLE_ERROR` and is re-raised.
    #[instrument(skip(self), fields(bundle_id = %id, correlation_id = %correlation_id))]
    pub async fn trigger_encryption(&self, id: Uuid, correlation_id: &str) -> DomainResult<()> {
        info!("triggering bundle encryption");

        let Some(bundle) = self.store.get(id).await? else {
            warn!("no bundle found, will not send it for encryption");
            return Ok(());
        };

        self.store
            .update_status(id, BundleStatus::EncryptionRequested, Utc::now())
            .await?;

        let message = self.encryption_factory.from_bundle(&bundle);
        if let Err(publish_error) = self
            .encryption_producer
            .publish_encryption_request(&message, correlation_id)
            .await
        {
            self.compensate(id, Utc::now()).await;
            return Err(publish_error);
        }

        Ok(())
    }

    /// Mark the row failed after a publish error. The original publish
    /// failure is what gets re-raised; a failed compensation is only logged.
    async fn compensate(&self, id: Uuid, message_timestamp: DateTime<Utc>) {
        if let Err(e) = self
            .store
            .update_status(id, BundleStatus::BundleError, message_timestamp)
            .await
        {
            error!(bundle_id = %id, error = %e, "failed to compensate bundle to BUNDLE_ERROR");
        }
    }
}
