//! Delivery-note recognition client.
//!
//! Sends a photographed delivery note to the external recognition
//! service and returns the extracted fields. Missing fields come back
//! as empty strings so the mobile form can prefill unconditionally.

use anyhow::{Context, Result};
use reqwest::{multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::ApiError;

/// Client for the recognition service.
#[derive(Clone)]
pub struct RecognitionClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Fields extracted from a delivery note.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeliveryNoteFields {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub request_number: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub net_weight: String,
    #[serde(default)]
    pub gross_weight: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub vehicle: String,
}

/// Error response from the recognition service.
#[derive(Debug, Deserialize)]
struct RecognitionErrorResponse {
    message: String,
}

/// Wire shape of a successful recognition; every field may be null.
#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    sender: Option<String>,
    date: Option<String>,
    request_number: Option<String>,
    receiver: Option<String>,
    item_name: Option<String>,
    size: Option<String>,
    quantity: Option<String>,
    net_weight: Option<String>,
    gross_weight: Option<String>,
    volume: Option<String>,
    carrier: Option<String>,
    vehicle: Option<String>,
}

impl From<RecognitionResponse> for DeliveryNoteFields {
    fn from(raw: RecognitionResponse) -> Self {
        Self {
            sender: raw.sender.unwrap_or_default(),
            date: raw.date.unwrap_or_default(),
            request_number: raw.request_number.unwrap_or_default(),
            receiver: raw.receiver.unwrap_or_default(),
            item_name: raw.item_name.unwrap_or_default(),
            size: raw.size.unwrap_or_default(),
            quantity: raw.quantity.unwrap_or_default(),
            net_weight: raw.net_weight.unwrap_or_default(),
            gross_weight: raw.gross_weight.unwrap_or_default(),
            volume: raw.volume.unwrap_or_default(),
            carrier: raw.carrier.unwrap_or_default(),
            vehicle: raw.vehicle.unwrap_or_default(),
        }
    }
}

impl RecognitionClient {
    /// Create a new recognition service client.
    pub fn new(base_url: &str, token: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, "Recognition client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Submit a delivery-note image for extraction.
    pub async fn recognize_delivery_note(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<DeliveryNoteFields, ApiError> {
        let url = format!("{}/v1/delivery-notes/recognize", self.base_url);

        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        debug!(url = %url, file_name = file_name, "Recognition request");

        let response = self
            .client
            .post(&url)
            .header("X-Internal-Token", &self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Recognition service request failed");
                ApiError::Internal(anyhow::anyhow!("Recognition service unavailable: {}", e))
            })?;

        let status = response.status();

        if status.is_success() {
            let raw = response.json::<RecognitionResponse>().await.map_err(|e| {
                error!(error = %e, "Failed to parse recognition response");
                ApiError::Internal(anyhow::anyhow!("Invalid recognition response: {}", e))
            })?;
            Ok(raw.into())
        } else {
            let message = response
                .json::<RecognitionErrorResponse>()
                .await
                .ok()
                .map(|e| e.message)
                .unwrap_or_else(|| format!("Recognition service error: {}", status));

            match status {
                StatusCode::BAD_REQUEST => Err(ApiError::BadRequest(message)),
                StatusCode::UNAUTHORIZED => {
                    error!("Recognition service authentication failed");
                    Err(ApiError::Internal(anyhow::anyhow!(
                        "Recognition service auth error"
                    )))
                }
                _ => {
                    error!(status = %status, message = %message, "Recognition service error");
                    Err(ApiError::Internal(anyhow::anyhow!(message)))
                }
            }
        }
    }

    /// Check recognition service health.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Recognition service health check failed")?
            .error_for_status()
            .context("Recognition service unhealthy")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fields_become_empty_strings() {
        let raw: RecognitionResponse = serde_json::from_str(
            r#"{"sender": "SteelWorks LLC", "date": null, "request_number": "RN-42",
                "receiver": null, "item_name": "Rebar A500C", "size": null,
                "quantity": "120", "net_weight": null, "gross_weight": null,
                "volume": null, "carrier": null, "vehicle": "KAMAZ 65115"}"#,
        )
        .unwrap();

        let fields = DeliveryNoteFields::from(raw);
        assert_eq!(fields.sender, "SteelWorks LLC");
        assert_eq!(fields.date, "");
        assert_eq!(fields.receiver, "");
        assert_eq!(fields.vehicle, "KAMAZ 65115");
    }
}
