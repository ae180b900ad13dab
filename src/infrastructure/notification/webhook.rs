//! Webhook notification sink

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::analysis::ExperimentResults;
use crate::domain::experiment::ExperimentId;
use crate::domain::notification::{ExperimentEndedNotification, NotificationSink};
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Posts auto-end notifications as signed JSON to a webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    url: String,
    secret: Option<String>,
    timeout: Duration,
    http_client: Client,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let url = url.into();

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(DomainError::configuration(
                "Webhook URL must start with http:// or https://",
            ));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url,
            secret: None,
            timeout,
            http_client,
        })
    }

    /// Sign payloads with HMAC-SHA256
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Generates HMAC-SHA256 signature for a payload
    fn generate_signature(secret: &str, payload: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| DomainError::internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(
        &self,
        experiment_id: &ExperimentId,
        reason: &str,
        report: &ExperimentResults,
    ) -> Result<(), DomainError> {
        let notification = ExperimentEndedNotification::new(experiment_id, reason, report);
        let payload = serde_json::to_string(&notification)
            .map_err(|e| DomainError::internal(format!("Failed to serialize payload: {}", e)))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", notification.event.as_str())
            .header("X-Webhook-Delivery-Id", notification.id.as_str());

        if let Some(ref secret) = self.secret {
            let signature = Self::generate_signature(secret, &payload)?;
            request = request.header("X-Webhook-Signature", format!("sha256={}", signature));
        }

        let response = request.body(payload).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            warn!(experiment_id = %experiment_id, error = %message, "Webhook delivery failed");
            DomainError::notification(message)
        })?;

        let status = response.status().as_u16();

        if !(200..300).contains(&status) {
            warn!(
                experiment_id = %experiment_id,
                status = status,
                "Webhook delivery failed with HTTP error"
            );
            return Err(DomainError::notification(format!("HTTP status {}", status)));
        }

        info!(
            experiment_id = %experiment_id,
            delivery_id = %notification.id,
            status = status,
            "Webhook delivery succeeded"
        );

        Ok(())
    }
}
