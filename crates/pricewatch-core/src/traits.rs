use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;

use crate::alert::AlertEvent;
use crate::error::AppError;
use crate::job::{JobFilter, JobReference, Observation};
use crate::models::{FailureRecord, ItemContext};

/// A stateful extraction context (one browser tab, one HTTP client, ...).
///
/// A driver is used by exactly one job at a time; the pool hands out `&mut`
/// access through its slot.
pub trait PageDriver: Send + 'static {
    /// Load `locator`, wait for the price nodes to settle, and return their raw
    /// text. Implementations return [`AppError::Timeout`] when the content does
    /// not stabilise within `timeout`.
    fn load_tokens(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Release backend resources. Called once during teardown.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Reads the set of references to price in a cycle.
pub trait JobSource: Send + Sync + Clone {
    fn eligible_jobs(
        &self,
        filter: &JobFilter,
    ) -> impl Future<Output = Result<Vec<JobReference>, AppError>> + Send;
}

/// Persists observations, one row per key.
pub trait ObservationStore: Send + Sync + Clone + 'static {
    /// Write the observation for `observation.key` and commit immediately.
    ///
    /// An absent value must not overwrite the last known price.
    fn update_observation(
        &self,
        observation: &Observation,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Looks up display metadata for an item.
pub trait ItemDirectory: Send + Sync + Clone + 'static {
    fn describe(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<ItemContext>, AppError>> + Send;
}

/// Durable storage behind the failure ledger.
///
/// Every mutation must be atomic per key in the store itself; callers on
/// different workers and different processes share it without coordination.
pub trait LedgerStore: Send + Sync + Clone + 'static {
    /// Upsert a failure for `key` on `today` and return the updated record.
    fn record_failure(
        &self,
        key: &str,
        today: NaiveDate,
    ) -> impl Future<Output = Result<FailureRecord, AppError>> + Send;

    /// Reset counters for `key`. A key with no record is left without one.
    fn record_success(
        &self,
        key: &str,
        today: NaiveDate,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<FailureRecord>, AppError>> + Send;

    /// Records whose streak is at least `min_consecutive_days`, longest first.
    fn list_streaks(
        &self,
        min_consecutive_days: u32,
    ) -> impl Future<Output = Result<Vec<FailureRecord>, AppError>> + Send;
}

/// Outbound delivery of alert events (webhook, chat, ...).
pub trait NotificationTransport: Send + Sync + Clone + 'static {
    fn send(&self, event: &AlertEvent) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A transport that drops every event.
#[derive(Debug, Clone)]
pub struct NullTransport;

impl NotificationTransport for NullTransport {
    async fn send(&self, event: &AlertEvent) -> Result<(), AppError> {
        tracing::debug!(key = %event.key(), "No transport configured, dropping alert");
        Ok(())
    }
}
