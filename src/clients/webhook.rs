use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;
use crate::models::event::NotificationPayload;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), AppError>;
}

/// Posts payloads as JSON to a webhook (Slack workflow trigger or similar).
pub struct WebhookSink {
    url: String,
    http: reqwest::Client,
}

impl WebhookSink {
    /// `timeout` bounds each request from connect to the last body byte.
    pub fn new(url: String, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Notification(format!("unable to build webhook client: {}", e)))?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!(
                "webhook responded {}: {}",
                status, body
            )));
        }
        info!(title = %payload.title, "Sent notification");
        Ok(())
    }
}

/// Logs payloads instead of sending them. Used for dry runs and when no
/// webhook is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let body = serde_json::to_string(payload).map_err(|e| AppError::Notification(e.to_string()))?;
        info!(payload = %body, "Notification (not sent)");
        Ok(())
    }
}
