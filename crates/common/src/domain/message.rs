use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feedback reported by the generation and encryption pipelines.
///
/// Delivery is at-least-once and unordered; `message_timestamp` is the only
/// ordering signal. A message without it cannot be applied and is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackMessage {
    pub id: Uuid,
    pub phase_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FeedbackError>,
}

/// Error details a pipeline attaches when it reports a failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackError {
    pub code: String,
    pub message: String,
}

/// Request published to the generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMessage {
    pub id: Uuid,
    pub application_id: String,
    pub application_version: String,
    pub platform_name: String,
    pub firmware_version: String,
    pub oci_image_url: String,
    pub encrypt: bool,
}

/// Request published to the encryption pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMessage {
    pub id: Uuid,
    pub application_id: String,
    pub application_version: String,
    pub platform_name: String,
    pub firmware_version: String,
    pub bundle_url: String,
    pub environment: String,
}
