use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::FailureRecord;
use crate::traits::LedgerStore;

/// Consecutive failing days before an item is escalated.
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 2;

/// Calendar day used for streak accounting (operator's local time).
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Tracks per-key failure streaks on top of a durable [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct FailureLedger<L: LedgerStore> {
    store: L,
    threshold: u32,
}

impl<L: LedgerStore> FailureLedger<L> {
    pub fn new(store: L, threshold: u32) -> Self {
        Self { store, threshold }
    }

    pub fn store(&self) -> &L {
        &self.store
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub async fn record_success(&self, key: &str) -> Result<(), AppError> {
        self.record_success_on(key, today()).await
    }

    pub async fn record_success_on(&self, key: &str, date: NaiveDate) -> Result<(), AppError> {
        self.store.record_success(key, date).await?;
        tracing::debug!(key, "Failure streak cleared");
        Ok(())
    }

    pub async fn record_failure(&self, key: &str) -> Result<FailureRecord, AppError> {
        self.record_failure_on(key, today()).await
    }

    pub async fn record_failure_on(
        &self,
        key: &str,
        date: NaiveDate,
    ) -> Result<FailureRecord, AppError> {
        let record = self.store.record_failure(key, date).await?;
        tracing::info!(
            key,
            failure_count = record.failure_count,
            consecutive_days = record.consecutive_days,
            "Failure recorded"
        );
        Ok(record)
    }

    pub fn should_escalate(&self, record: &FailureRecord) -> bool {
        record.consecutive_days >= self.threshold
    }

    pub async fn record(&self, key: &str) -> Result<Option<FailureRecord>, AppError> {
        self.store.get(key).await
    }

    /// Every record currently at or above the escalation threshold.
    pub async fn escalated(&self) -> Result<Vec<FailureRecord>, AppError> {
        self.store.list_streaks(self.threshold).await
    }
}
