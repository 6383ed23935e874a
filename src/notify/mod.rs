pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::AppError;

pub use dto::Notification;

/// Delivery side of push reminders.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Forwards notifications as JSON to a push gateway.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        let payload = dto::WebhookPayload {
            kind: "task_reminder",
            notification,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!(
                "push gateway responded {}: {}",
                status, body
            )));
        }

        debug!(
            "pushed reminder for task {} on {}",
            notification.task_id, notification.date
        );
        Ok(())
    }
}

/// Used when no push gateway is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        info!(
            "reminder (not delivered, no push gateway): {} for user {}",
            notification.title, notification.user_id
        );
        Ok(())
    }
}
