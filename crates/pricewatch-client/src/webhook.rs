use std::time::Duration;

use pricewatch_core::alert::{AlertEvent, Severity};
use pricewatch_core::error::AppError;
use pricewatch_core::traits::NotificationTransport;
use reqwest::Client;
use serde_json::{Value, json};

/// Chat webhooks cap message bodies at this many characters.
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts alerts to chat webhooks as `{"content": "<message>"}`.
///
/// Notices and critical alerts can go to different channels. A critical alert
/// falls back to the notice URL when no critical URL is set; an event with no
/// destination at all is dropped.
#[derive(Clone)]
pub struct WebhookTransport {
    client: Client,
    notice_url: Option<String>,
    critical_url: Option<String>,
}

impl WebhookTransport {
    pub fn new(notice_url: Option<String>, critical_url: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("Pricewatch/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::NotificationError(e.to_string()))?;

        Ok(Self {
            client,
            notice_url,
            critical_url,
        })
    }

    fn route(&self, severity: Severity) -> Option<&str> {
        match severity {
            Severity::Notice => self.notice_url.as_deref(),
            Severity::Critical => self
                .critical_url
                .as_deref()
                .or(self.notice_url.as_deref()),
        }
    }
}

impl NotificationTransport for WebhookTransport {
    async fn send(&self, event: &AlertEvent) -> Result<(), AppError> {
        let Some(url) = self.route(event.severity()) else {
            tracing::debug!(key = event.key(), "No webhook configured for alert");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&payload(event))
            .send()
            .await
            .map_err(|e| AppError::NotificationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NotificationError(format!(
                "Webhook returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

fn payload(event: &AlertEvent) -> Value {
    let message = event.message();
    let content = match message.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => &message[..cut],
        None => message.as_str(),
    };
    json!({ "content": content })
}
