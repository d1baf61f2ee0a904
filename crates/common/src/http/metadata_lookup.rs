use crate::domain::{ApplicationMetadata, BundleCoordinates, LookupError, MetadataLookup};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// REST client for the application metadata service.
///
/// A 404 is a normal outcome (`LookupError::NotFound`, recoverable); any
/// other non-success status is a real failure that feeds the circuit
/// breaker guarding this dependency.
pub struct HttpMetadataLookup {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataResponse {
    header: MetadataHeader,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataHeader {
    oci_image_url: String,
}

impl HttpMetadataLookup {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl MetadataLookup for HttpMetadataLookup {
    #[instrument(skip(self, coordinates), fields(coordinates = %coordinates))]
    async fn lookup(
        &self,
        coordinates: &BundleCoordinates,
    ) -> Result<ApplicationMetadata, LookupError> {
        let url = format!(
            "{}/apps/{}:{}",
            self.base_url, coordinates.application_id, coordinates.application_version
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("platformName", coordinates.platform_name.as_str()),
                ("firmwareVer", coordinates.firmware_version.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "metadata request failed to complete");
                LookupError::Transport(e.to_string())
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LookupError::NotFound(coordinates.to_string())),
            status if status.is_success() => {
                let body: MetadataResponse = response
                    .json()
                    .await
                    .map_err(|e| LookupError::Decode(e.to_string()))?;
                info!("resolved application metadata");
                Ok(ApplicationMetadata {
                    oci_image_url: body.header.oci_image_url,
                })
            }
            status => {
                warn!(status = status.as_u16(), "metadata service returned an error status");
                Err(LookupError::RemoteStatus {
                    status: status.as_u16(),
                })
            }
        }
    }
}
