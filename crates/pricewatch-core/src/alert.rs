//! Alert events and their fire-and-forget delivery.

use std::fmt::Write as _;

use serde::Serialize;
use tokio_util::task::TaskTracker;

use crate::job::JobReference;
use crate::models::{FailureRecord, ItemContext};
use crate::traits::{ItemDirectory, NotificationTransport};

/// Routing class of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational: a single job ended without a price.
    Notice,
    /// Needs a human: an item has been failing for days.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    NoDataAfterRetries {
        key: String,
        locator: String,
        attempts: u32,
        last_error: Option<String>,
    },
    ThresholdBreached {
        key: String,
        locator: String,
        record: FailureRecord,
        context: ItemContext,
    },
}

impl AlertEvent {
    pub fn key(&self) -> &str {
        match self {
            AlertEvent::NoDataAfterRetries { key, .. } | AlertEvent::ThresholdBreached { key, .. } => {
                key
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AlertEvent::NoDataAfterRetries { .. } => "no-data-after-retries",
            AlertEvent::ThresholdBreached { .. } => "consecutive-day-threshold-breached",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertEvent::NoDataAfterRetries { .. } => Severity::Notice,
            AlertEvent::ThresholdBreached { .. } => Severity::Critical,
        }
    }

    /// Human-readable message body for chat-style transports.
    pub fn message(&self) -> String {
        match self {
            AlertEvent::NoDataAfterRetries {
                key,
                locator,
                attempts,
                last_error: None,
            } => format!("No prices found for {key} after {attempts} attempts: {locator}"),
            AlertEvent::NoDataAfterRetries {
                key,
                locator,
                attempts,
                last_error: Some(error),
            } => format!(
                "Failed to price {key} after {attempts} attempts: {locator}\nLast error: {error}"
            ),
            AlertEvent::ThresholdBreached {
                key,
                locator,
                record,
                context,
            } => {
                let mut msg = format!(
                    "{key} has failed to price on {} consecutive days ({} failures since the last success)\n{locator}\n",
                    record.consecutive_days, record.failure_count
                );
                if context.is_placeholder() {
                    msg.push_str("\nNo item details found for this key");
                    return msg;
                }
                let _ = write!(msg, "\nItem: {}", context.name);
                if let Some(image) = &context.image {
                    let _ = write!(msg, "\nImage: {image}");
                }
                if !context.groups.is_empty() {
                    msg.push_str("\n\nAppears in:");
                    for group in &context.groups {
                        let _ = write!(msg, "\n- {group}");
                    }
                }
                msg
            }
        }
    }
}

/// Delivers alerts in the background so a slow webhook never holds up a worker.
///
/// Delivery errors are logged and dropped. Call [`AlertSink::flush`] before
/// shutting down to let in-flight deliveries finish.
#[derive(Debug, Clone)]
pub struct AlertSink<N, D>
where
    N: NotificationTransport,
    D: ItemDirectory,
{
    transport: N,
    directory: D,
    tracker: TaskTracker,
}

impl<N, D> AlertSink<N, D>
where
    N: NotificationTransport,
    D: ItemDirectory,
{
    pub fn new(transport: N, directory: D) -> Self {
        Self {
            transport,
            directory,
            tracker: TaskTracker::new(),
        }
    }

    /// Send `event` as is.
    pub fn notify(&self, event: AlertEvent) {
        let transport = self.transport.clone();
        self.tracker.spawn(async move {
            deliver(&transport, &event).await;
        });
    }

    /// Send a threshold breach for `job`, enriched with item context.
    ///
    /// The context lookup is best effort; on failure the alert goes out with
    /// placeholder context.
    pub fn escalate(&self, job: &JobReference, record: FailureRecord) {
        let transport = self.transport.clone();
        let directory = self.directory.clone();
        let job = job.clone();
        self.tracker.spawn(async move {
            let context = match directory.describe(&job.key).await {
                Ok(Some(context)) => context,
                Ok(None) => ItemContext::placeholder(),
                Err(e) => {
                    tracing::warn!(key = %job.key, error = %e, "Item context lookup failed");
                    ItemContext::placeholder()
                }
            };
            let event = AlertEvent::ThresholdBreached {
                key: job.key,
                locator: job.locator,
                record,
                context,
            };
            deliver(&transport, &event).await;
        });
    }

    /// Alerts spawned but not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every alert spawned so far to finish.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

async fn deliver<N: NotificationTransport>(transport: &N, event: &AlertEvent) {
    match transport.send(event).await {
        Ok(()) => tracing::info!(key = event.key(), kind = event.kind(), "Alert delivered"),
        Err(e) => tracing::error!(
            key = event.key(),
            kind = event.kind(),
            error = %e,
            "Failed to deliver alert"
        ),
    }
}
