//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls. Clones share state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;

use crate::alert::AlertEvent;
use crate::dispatcher::{DispatchEvent, DispatchReporter};
use crate::error::AppError;
use crate::job::{JobFilter, JobReference, Observation};
use crate::models::{FailureRecord, ItemContext};
use crate::traits::{
    ItemDirectory, JobSource, LedgerStore, NotificationTransport, ObservationStore, PageDriver,
};

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

type Script = HashMap<String, VecDeque<Result<Vec<String>, AppError>>>;

/// Page driver that replays scripted responses per locator.
///
/// Each load pops the next scripted response for its locator. An unscripted
/// load returns no tokens (an empty page).
#[derive(Clone, Default)]
pub struct MockDriver {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    shutdowns: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each load.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(&self, locator: &str, tokens: Vec<&str>) {
        self.push(
            locator,
            Ok(tokens.into_iter().map(str::to_string).collect()),
        );
    }

    pub fn script_error(&self, locator: &str, error: AppError) {
        self.push(locator, Err(error));
    }

    fn push(&self, locator: &str, response: Result<Vec<String>, AppError>) {
        self.script
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, locator: &str) -> usize {
        self.calls.lock().unwrap().get(locator).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl PageDriver for MockDriver {
    async fn load_tokens(
        &mut self,
        locator: &str,
        _timeout: Duration,
    ) -> Result<Vec<String>, AppError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(locator)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory item table: job source, observation store and item directory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<Mutex<Vec<JobReference>>>,
    jobs_error: Arc<Mutex<Option<AppError>>>,
    observations: Arc<Mutex<Vec<Observation>>>,
    update_errors: Arc<Mutex<VecDeque<AppError>>>,
    contexts: Arc<Mutex<HashMap<String, ItemContext>>>,
    describe_error: Arc<Mutex<Option<AppError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, job: JobReference) {
        self.jobs.lock().unwrap().push(job);
    }

    /// Make the next `eligible_jobs` call fail.
    pub fn fail_jobs(&self, error: AppError) {
        *self.jobs_error.lock().unwrap() = Some(error);
    }

    /// Make the next `update_observation` call fail.
    pub fn fail_next_update(&self, error: AppError) {
        self.update_errors.lock().unwrap().push_back(error);
    }

    pub fn add_context(&self, key: &str, context: ItemContext) {
        self.contexts
            .lock()
            .unwrap()
            .insert(key.to_string(), context);
    }

    /// Make the next `describe` call fail.
    pub fn fail_describe(&self, error: AppError) {
        *self.describe_error.lock().unwrap() = Some(error);
    }

    /// Successfully written observations, in write order.
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }
}

impl JobSource for MemoryStore {
    async fn eligible_jobs(&self, filter: &JobFilter) -> Result<Vec<JobReference>, AppError> {
        if let Some(error) = self.jobs_error.lock().unwrap().take() {
            return Err(error);
        }
        let jobs = self.jobs.lock().unwrap().clone();
        Ok(match filter.limit {
            Some(limit) => jobs.into_iter().take(limit).collect(),
            None => jobs,
        })
    }
}

impl ObservationStore for MemoryStore {
    async fn update_observation(&self, observation: &Observation) -> Result<(), AppError> {
        if let Some(error) = self.update_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.observations.lock().unwrap().push(observation.clone());
        Ok(())
    }
}

impl ItemDirectory for MemoryStore {
    async fn describe(&self, key: &str) -> Result<Option<ItemContext>, AppError> {
        if let Some(error) = self.describe_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.contexts.lock().unwrap().get(key).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryLedgerStore
// ---------------------------------------------------------------------------

/// Ledger store applying the [`FailureRecord`] transitions under one lock.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    records: Arc<Mutex<HashMap<String, FailureRecord>>>,
    error: Arc<Mutex<Option<String>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: FailureRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.key.clone(), record);
    }

    pub fn snapshot(&self, key: &str) -> Option<FailureRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    /// Make every subsequent call fail with a database error.
    pub fn fail_with(&self, error: AppError) {
        *self.error.lock().unwrap() = Some(error.to_string());
    }

    fn check(&self) -> Result<(), AppError> {
        match self.error.lock().unwrap().as_ref() {
            Some(msg) => Err(AppError::DatabaseError(msg.clone())),
            None => Ok(()),
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn record_failure(&self, key: &str, today: NaiveDate) -> Result<FailureRecord, AppError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let next = match records.get(key) {
            Some(existing) => existing.after_failure(today),
            None => FailureRecord::first_failure(key, today),
        };
        records.insert(key.to_string(), next.clone());
        Ok(next)
    }

    async fn record_success(&self, key: &str, today: NaiveDate) -> Result<(), AppError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get(key) {
            let next = existing.after_success(today);
            records.insert(key.to_string(), next);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<FailureRecord>, AppError> {
        self.check()?;
        Ok(self.snapshot(key))
    }

    async fn list_streaks(&self, min_consecutive_days: u32) -> Result<Vec<FailureRecord>, AppError> {
        self.check()?;
        let mut streaks: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.consecutive_days >= min_consecutive_days)
            .cloned()
            .collect();
        streaks.sort_by(|a, b| b.consecutive_days.cmp(&a.consecutive_days));
        Ok(streaks)
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Transport that records delivered events.
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<AlertEvent>>>,
    attempts: Arc<AtomicUsize>,
    fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationTransport for MockTransport {
    async fn send(&self, event: &AlertEvent) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::NotificationError("webhook returned 500".into()));
        }
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps the events tests assert on.
#[derive(Default)]
pub struct MockReporter {
    attempt_failures: Mutex<Vec<(String, u32, bool)>>,
    anomalies: AtomicUsize,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(key, attempt, will_retry)` for every failed attempt.
    pub fn attempt_failures(&self) -> Vec<(String, u32, bool)> {
        self.attempt_failures.lock().unwrap().clone()
    }

    pub fn anomalies(&self) -> usize {
        self.anomalies.load(Ordering::SeqCst)
    }
}

impl DispatchReporter for MockReporter {
    fn report(&self, event: DispatchEvent<'_>) {
        match event {
            DispatchEvent::AttemptFailed {
                job,
                attempt,
                will_retry,
                ..
            } => {
                self.attempt_failures
                    .lock()
                    .unwrap()
                    .push((job.key.clone(), attempt, will_retry));
            }
            DispatchEvent::Anomaly { .. } => {
                self.anomalies.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}
