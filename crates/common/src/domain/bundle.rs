use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of the application/platform/firmware combination a bundle is
/// built for. Immutable once a bundle row is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Validate, Serialize, Deserialize)]
pub struct BundleCoordinates {
    #[garde(length(min = 1))]
    pub application_id: String,
    #[garde(length(min = 1))]
    pub application_version: String,
    #[garde(length(min = 1))]
    pub platform_name: String,
    #[garde(length(min = 1))]
    pub firmware_version: String,
}

impl fmt::Display for BundleCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.application_id, self.application_version, self.platform_name, self.firmware_version
        )
    }
}

/// Lifecycle phase of a bundle row.
///
/// Progression is driven by feedback messages from the generation and
/// encryption pipelines; `BundleError` marks the row failed for good. A new
/// cycle for the same coordinates starts a fresh row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    GenerationRequested,
    GenerationLaunched,
    GenerationCompleted,
    EncryptionRequested,
    EncryptionLaunched,
    EncryptionCompleted,
    BundleError,
}

impl BundleStatus {
    /// Wire/storage representation, identical to the phase codes carried by
    /// feedback messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStatus::GenerationRequested => "GENERATION_REQUESTED",
            BundleStatus::GenerationLaunched => "GENERATION_LAUNCHED",
            BundleStatus::GenerationCompleted => "GENERATION_COMPLETED",
            BundleStatus::EncryptionRequested => "ENCRYPTION_REQUESTED",
            BundleStatus::EncryptionLaunched => "ENCRYPTION_LAUNCHED",
            BundleStatus::EncryptionCompleted => "ENCRYPTION_COMPLETED",
            BundleStatus::BundleError => "BUNDLE_ERROR",
        }
    }

    /// Parse a feedback phase code. Unknown codes yield `None`; callers drop
    /// such messages instead of failing.
    pub fn from_phase_code(code: &str) -> Option<Self> {
        match code {
            "GENERATION_REQUESTED" => Some(BundleStatus::GenerationRequested),
            "GENERATION_LAUNCHED" => Some(BundleStatus::GenerationLaunched),
            "GENERATION_COMPLETED" => Some(BundleStatus::GenerationCompleted),
            "ENCRYPTION_REQUESTED" => Some(BundleStatus::EncryptionRequested),
            "ENCRYPTION_LAUNCHED" => Some(BundleStatus::EncryptionLaunched),
            "ENCRYPTION_COMPLETED" => Some(BundleStatus::EncryptionCompleted),
            "BUNDLE_ERROR" => Some(BundleStatus::BundleError),
            _ => None,
        }
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation-(+optional encryption)-cycle unit of work.
///
/// `status` and `message_timestamp` only change together, and only when the
/// incoming message timestamp is strictly newer than the stored one. The
/// audit fields are owned by the store and absent until persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub id: Uuid,
    pub coordinates: BundleCoordinates,
    pub status: BundleStatus,
    pub correlation_id: String,
    pub message_timestamp: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bundle {
    pub fn new(
        id: Uuid,
        coordinates: BundleCoordinates,
        status: BundleStatus,
        correlation_id: impl Into<String>,
        message_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            coordinates,
            status,
            correlation_id: correlation_id.into(),
            message_timestamp,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Ephemeral trigger payload for one generation request. Lives only for the
/// duration of the request and is never persisted as such.
#[derive(Debug, Clone)]
pub struct BundleContext {
    pub bundle: Bundle,
    pub artifact_url: String,
    pub encrypt: bool,
}
