use std::time::Duration;

use crate::aggregate::DEFAULT_MARKUP;
use crate::error::AppError;
use crate::extraction::DEFAULT_FETCH_TIMEOUT;
use crate::ledger::DEFAULT_ESCALATION_THRESHOLD;
use crate::pool::ResourceKind;
use crate::retry::Backoff;

/// Configuration for one dispatch pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of extraction workers (and job chunks).
    pub worker_count: usize,
    /// Attempts per job, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Consecutive failing days that trigger a critical alert.
    pub escalation_threshold: u32,
    pub fetch_timeout: Duration,
    pub markup: f64,
    /// Delay between worker start-ups; worker `i` starts after `i * stagger`.
    pub stagger: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_attempts: 2,
            backoff: Backoff::default(),
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            markup: DEFAULT_MARKUP,
            stagger: Duration::ZERO,
        }
    }
}

impl PipelineConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_escalation_threshold(mut self, threshold: u32) -> Self {
        self.escalation_threshold = threshold;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_markup(mut self, markup: f64) -> Self {
        self.markup = markup;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let max_workers = ResourceKind::Worker.max_capacity();
        if self.worker_count == 0 || self.worker_count > max_workers {
            return Err(AppError::ConfigError(format!(
                "worker count must be between 1 and {max_workers}, got {}",
                self.worker_count
            )));
        }
        if self.max_attempts == 0 {
            return Err(AppError::ConfigError(
                "max attempts must be at least 1".into(),
            ));
        }
        if self.escalation_threshold == 0 {
            return Err(AppError::ConfigError(
                "escalation threshold must be at least 1".into(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AppError::ConfigError("fetch timeout must be non-zero".into()));
        }
        if !self.markup.is_finite() || self.markup <= 0.0 {
            return Err(AppError::ConfigError(format!(
                "markup must be a positive number, got {}",
                self.markup
            )));
        }
        if self.backoff.min > self.backoff.max {
            return Err(AppError::ConfigError(
                "backoff minimum exceeds maximum".into(),
            ));
        }
        Ok(())
    }
}
