use common::domain::{Bundle, BundleCoordinates, EncryptionMessage};

/// Builds encryption-request payloads deterministically from a bundle's
/// coordinates, the configured environment name, and the artifact-extension
/// convention.
///
/// Bundle URL convention:
/// `/{app}/{version}/{platform}/{firmware}/{app}-{version}-{platform}-{firmware}.{extension}`
#[derive(Debug, Clone)]
pub struct EncryptionMessageFactory {
    environment: String,
    bundle_extension: String,
}

impl EncryptionMessageFactory {
    pub fn new(environment: impl Into<String>, bundle_extension: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            bundle_extension: bundle_extension.into(),
        }
    }

    pub fn from_bundle(&self, bundle: &Bundle) -> EncryptionMessage {
        let coords = &bundle.coordinates;
        EncryptionMessage {
            id: bundle.id,
            application_id: coords.application_id.clone(),
            application_version: coords.application_version.clone(),
            platform_name: coords.platform_name.clone(),
            firmware_version: coords.firmware_version.clone(),
            bundle_url: self.bundle_url(coords),
            environment: self.environment.clone(),
        }
    }

    fn bundle_url(&self, coords: &BundleCoordinates) -> String {
        format!(
            "/{}/{}/{}/{}/{}",
            coords.application_id,
            coords.application_version,
            coords.platform_name,
            coords.firmware_version,
            self.bundle_name(coords)
        )
    }

    fn bundle_name(&self, coords: &BundleCoordinates) -> String {
        format!(
            "{}-{}-{}-{}.{}",
            coords.application_id,
            coords.application_version,
            coords.platform_name,
            coords.firmware_version,
            self.bundle_extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::BundleStatus;
    use uuid::Uuid;

    fn bundle() -> Bundle {
        Bundle::new(
            Uuid::new_v4(),
            BundleCoordinates {
                application_id: "com.example.weather".to_string(),
                application_version: "2.1.0".to_string(),
                platform_name: "stb".to_string(),
                firmware_version: "fw-42".to_string(),
            },
            BundleStatus::GenerationCompleted,
            "req-1",
            Utc::now(),
        )
    }

    #[test]
    fn builds_bundle_url_from_coordinates_and_extension() {
        let factory = EncryptionMessageFactory::new("prod", "tar.gz");

        let message = factory.from_bundle(&bundle());

        assert_eq!(
            message.bundle_url,
            "/com.example.weather/2.1.0/stb/fw-42/com.example.weather-2.1.0-stb-fw-42.tar.gz"
        );
        assert_eq!(message.environment, "prod");
    }

    #[test]
    fn carries_bundle_identity_unchanged() {
        let factory = EncryptionMessageFactory::new("dev", "enc");
        let source = bundle();

        let message = factory.from_bundle(&source);

        assert_eq!(message.id, source.id);
        assert_eq!(message.application_id, source.coordinates.application_id);
        assert_eq!(message.platform_name, source.coordinates.platform_name);
    }
}
