use async_trait::async_trait;
use bundle_orchestrator::domain::{
    BundleService, EncryptionMessageFactory, EncryptionMessageProducer, GenerationMessageProducer,
    GenerationRequestOutcome,
};
use bundle_orchestrator::nats::{FeedbackPipeline, FeedbackProcessor};
use chrono::{DateTime, Duration, Utc};
use common::domain::{
    Bundle, BundleCoordinates, BundleStatus, BundleStore, DomainError, DomainResult,
    EncryptionMessage, FeedbackMessage, GenerationMessage, HandlerOutcome,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Store double with the real conditional-update semantics, so ordering
/// properties can be exercised end to end.
#[derive(Default)]
struct InMemoryBundleStore {
    rows: Mutex<HashMap<Uuid, Bundle>>,
}

impl InMemoryBundleStore {
    fn row(&self, id: Uuid) -> Option<Bundle> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl BundleStore for InMemoryBundleStore {
    async fn get_latest(&self, coordinates: &BundleCoordinates) -> DomainResult<Option<Bundle>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|b| &b.coordinates == coordinates)
            .max_by_key(|b| b.updated_at.or(b.created_at))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Bundle>> {
        Ok(self.row(id))
    }

    async fn insert(&self, bundle: &Bundle) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&bundle.id) {
            return Err(DomainError::BundleAlreadyExists(bundle.id));
        }
        let mut stored = bundle.clone();
        stored.created_at = Some(Utc::now());
        rows.insert(stored.id, stored);
        Ok(())
    }

    async fn update_if_newer(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if message_timestamp > row.message_timestamp => {
                row.status = status;
                row.message_timestamp = message_timestamp;
                row.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BundleStatus,
        message_timestamp: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&id) {
            row.status = status;
            row.message_timestamp = message_timestamp;
            row.updated_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingGenerationProducer {
    published: Mutex<Vec<(GenerationMessage, String)>>,
    fail: bool,
}

impl RecordingGenerationProducer {
    fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationMessageProducer for RecordingGenerationProducer {
    async fn publish_generation_request(
        &self,
        message: &GenerationMessage,
        correlation_id: &str,
    ) -> DomainResult<()> {
        if self.fail {
            return Err(DomainError::DispatchError("broker unavailable".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((message.clone(), correlation_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingEncryptionProducer {
    published: Mutex<Vec<(EncryptionMessage, String)>>,
}

impl RecordingEncryptionProducer {
    fn published(&self) -> Vec<(EncryptionMessage, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EncryptionMessageProducer for RecordingEncryptionProducer {
    async fn publish_encryption_request(
        &self,
        message: &EncryptionMessage,
        correlation_id: &str,
    ) -> DomainResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((message.clone(), correlation_id.to_string()));
        Ok(())
    }
}

struct Fixture {
    store: Arc<InMemoryBundleStore>,
    generation: Arc<RecordingGenerationProducer>,
    encryption: Arc<RecordingEncryptionProducer>,
    service: Arc<BundleService>,
}

fn fixture_with(generation: RecordingGenerationProducer) -> Fixture {
    let store = Arc::new(InMemoryBundleStore::default());
    let generation = Arc::new(generation);
    let encryption = Arc::new(RecordingEncryptionProducer::default());
    let service = Arc::new(BundleService::new(
        Arc::clone(&store) as Arc<dyn BundleStore>,
        Arc::clone(&generation) as Arc<dyn GenerationMessageProducer>,
        Arc::clone(&encryption) as Arc<dyn EncryptionMessageProducer>,
        EncryptionMessageFactory::new("prod", "tar.gz"),
    ));
    Fixture {
        store,
        generation,
        encryption,
        service,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingGenerationProducer::default())
}

fn coordinates() -> BundleCoordinates {
    BundleCoordinates {
        application_id: "com.example.weather".to_string(),
        application_version: "1.0.0".to_string(),
        platform_name: "stb".to_string(),
        firmware_version: "fw-1".to_string(),
    }
}

fn feedback_payload(id: Uuid, phase_code: &str, timestamp: DateTime<Utc>) -> Vec<u8> {
    serde_json::to_vec(&FeedbackMessage {
        id,
        phase_code: phase_code.to_string(),
        message_timestamp: Some(timestamp),
        error: None,
    })
    .unwrap()
}

#[tokio::test]
async fn scenario_a_fresh_request_creates_row_and_publishes_generation() {
    let fx = fixture();

    let outcome = fx
        .service
        .request_generation(coordinates(), "r1", "oci://registry/weather:1.0.0", true)
        .await
        .unwrap();

    let GenerationRequestOutcome::Started(bundle) = outcome else {
        panic!("expected a started generation");
    };
    let stored = fx.store.row(bundle.id).unwrap();
    assert_eq!(stored.status, BundleStatus::GenerationRequested);

    let published = fx.generation.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(published[0].0.encrypt);
    assert_eq!(published[0].1, "r1");
}

#[tokio::test]
async fn skip_duplicate_only_error_rows_allow_a_new_cycle() {
    let fx = fixture();

    let first = fx
        .service
        .request_generation(coordinates(), "r1", "oci://registry/weather:1.0.0", true)
        .await
        .unwrap();
    let GenerationRequestOutcome::Started(first_bundle) = first else {
        panic!("expected a started generation");
    };

    // Second request while the first row is in flight: no new row.
    let second = fx
        .service
        .request_generation(coordinates(), "r2", "oci://registry/weather:1.0.0", true)
        .await
        .unwrap();
    assert!(matches!(second, GenerationRequestOutcome::AlreadyInFlight(_)));
    assert_eq!(fx.store.row_count(), 1);
    assert_eq!(fx.generation.count(), 1);

    // After the row fails, the same coordinates start a fresh cycle.
    fx.store
        .update_status(first_bundle.id, BundleStatus::BundleError, Utc::now())
        .await
        .unwrap();
    let third = fx
        .service
        .request_generation(coordinates(), "r3", "oci://registry/weather:1.0.0", true)
        .await
        .unwrap();
    assert!(matches!(third, GenerationRequestOutcome::Started(_)));
    assert_eq!(fx.store.row_count(), 2);
}

#[tokio::test]
async fn publish_failure_leaves_the_row_in_bundle_error() {
    let fx = fixture_with(RecordingGenerationProducer::failing());

    let result = fx
        .service
        .request_generation(coordinates(), "r1", "oci://registry/weather:1.0.0", true)
        .await;

    assert!(matches!(result, Err(DomainError::DispatchError(_))));
    let rows = fx.store.rows.lock().unwrap();
    let row = rows.values().next().unwrap();
    assert_eq!(row.status, BundleStatus::BundleError);
}

#[tokio::test]
async fn monotonicity_holds_for_both_delivery_orders() {
    // Feedback timestamps are pipeline-side times, always in the past.
    let base = Utc::now() - Duration::minutes(10);
    let t1 = base + Duration::seconds(10);
    let t2 = base + Duration::seconds(20);

    for reversed in [false, true] {
        let fx = fixture();
        let bundle = Bundle::new(
            Uuid::new_v4(),
            coordinates(),
            BundleStatus::GenerationRequested,
            "r1",
            base,
        );
        fx.store.insert(&bundle).await.unwrap();

        let updates = if reversed {
            [
                (BundleStatus::GenerationCompleted, t2),
                (BundleStatus::GenerationLaunched, t1),
            ]
        } else {
            [
                (BundleStatus::GenerationLaunched, t1),
                (BundleStatus::GenerationCompleted, t2),
            ]
        };
        for (status, timestamp) in updates {
            fx.service
                .apply_feedback(bundle.id, status, timestamp)
                .await
                .unwrap();
        }

        let row = fx.store.row(bundle.id).unwrap();
        assert_eq!(row.status, BundleStatus::GenerationCompleted);
        assert_eq!(row.message_timestamp, t2);
    }
}

#[tokio::test]
async fn stale_feedback_changes_nothing_and_publishes_nothing() {
    let fx = fixture();
    let base = Utc::now() - Duration::minutes(10);
    let bundle = Bundle::new(
        Uuid::new_v4(),
        coordinates(),
        BundleStatus::GenerationLaunched,
        "r1",
        base,
    );
    fx.store.insert(&bundle).await.unwrap();

    let processor = FeedbackProcessor::new(
        Arc::clone(&fx.service),
        FeedbackPipeline::Generation,
        true,
    );

    // Fresh completion applies and hands the bundle to encryption.
    let fresh = feedback_payload(bundle.id, "GENERATION_COMPLETED", base + Duration::seconds(5));
    assert_eq!(
        processor.process(&fresh, Some("r1".to_string())).await,
        HandlerOutcome::Applied
    );
    assert_eq!(fx.encryption.published().len(), 1);

    // Replay with the same timestamp: no state change, no second publish.
    assert_eq!(
        processor.process(&fresh, Some("r1".to_string())).await,
        HandlerOutcome::Stale
    );
    let row = fx.store.row(bundle.id).unwrap();
    assert_eq!(row.status, BundleStatus::EncryptionRequested);
    assert_eq!(fx.encryption.published().len(), 1);
}

#[tokio::test]
async fn scenario_b_completion_feedback_moves_row_to_encryption_requested() {
    let fx = fixture();
    let base = Utc::now() - Duration::minutes(10);
    let bundle = Bundle::new(
        Uuid::new_v4(),
        coordinates(),
        BundleStatus::GenerationLaunched,
        "r1",
        base,
    );
    fx.store.insert(&bundle).await.unwrap();

    let processor = FeedbackProcessor::new(
        Arc::clone(&fx.service),
        FeedbackPipeline::Generation,
        true,
    );
    let payload = feedback_payload(bundle.id, "GENERATION_COMPLETED", base + Duration::seconds(1));
    let outcome = processor.process(&payload, Some("r1".to_string())).await;

    assert_eq!(outcome, HandlerOutcome::Applied);
    let row = fx.store.row(bundle.id).unwrap();
    assert_eq!(row.status, BundleStatus::EncryptionRequested);

    let published = fx.encryption.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0.id, bundle.id);
    assert_eq!(published[0].1, "r1");
    assert_eq!(
        published[0].0.bundle_url,
        "/com.example.weather/1.0.0/stb/fw-1/com.example.weather-1.0.0-stb-fw-1.tar.gz"
    );
}
