//! Per-job attempt state machine and retry backoff.
//!
//! ```text
//! Pending(n) --> Attempting(n) --Success(v)-----------------------> Committed(v)
//!                    |
//!                    +--NoData / retryable error, n < max--> Pending(n+1)
//!                    +--otherwise------------------------------> Committed(absent)
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FailureKind};

/// Result of a single fetch-extract-aggregate-commit attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { value: f64 },
    NoData,
    Error { kind: FailureKind, detail: String },
}

impl AttemptOutcome {
    pub fn from_error(error: &AppError) -> Self {
        AttemptOutcome::Error {
            kind: error.kind(),
            detail: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    fn may_retry(&self) -> bool {
        match self {
            AttemptOutcome::Success { .. } => false,
            AttemptOutcome::NoData => true,
            AttemptOutcome::Error { kind, .. } => kind.is_retryable(),
        }
    }

    /// Error text, if this outcome carries one.
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Error { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// `None` means absent.
    pub value: Option<f64>,
    pub attempts: u32,
    /// The last failed outcome when the job ended absent.
    pub failure: Option<AttemptOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending { attempt: u32 },
    Attempting { attempt: u32 },
    Committed(Commit),
}

impl JobState {
    pub fn start() -> Self {
        JobState::Pending { attempt: 1 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Committed(_))
    }

    /// True for a pending retry, which waits out a backoff first.
    pub fn backoff_due(&self) -> bool {
        matches!(self, JobState::Pending { attempt } if *attempt > 1)
    }

    /// `Pending(n)` becomes `Attempting(n)`. Other states are unchanged.
    pub fn begin(self) -> Self {
        match self {
            JobState::Pending { attempt } => JobState::Attempting { attempt },
            other => other,
        }
    }

    /// Apply the outcome of the current attempt.
    ///
    /// Only meaningful from `Attempting`; other states are returned unchanged.
    pub fn on_outcome(self, outcome: AttemptOutcome, max_attempts: u32) -> Self {
        let attempt = match self {
            JobState::Attempting { attempt } => attempt,
            other => return other,
        };

        match outcome {
            AttemptOutcome::Success { value } => JobState::Committed(Commit {
                value: Some(value),
                attempts: attempt,
                failure: None,
            }),
            outcome if outcome.may_retry() && attempt < max_attempts => JobState::Pending {
                attempt: attempt + 1,
            },
            outcome => JobState::Committed(Commit {
                value: None,
                attempts: attempt,
                failure: Some(outcome),
            }),
        }
    }
}

/// Randomised wait between attempts of the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Result<Self, AppError> {
        if min > max {
            return Err(AppError::ConfigError(format!(
                "backoff minimum {min:?} exceeds maximum {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Draw a delay uniformly from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}
