use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Raw numeric observations from a single fetch attempt.
pub type SampleSet = Vec<f64>;

/// Durable per-key failure history.
///
/// The transition methods below are the reference semantics; the PostgreSQL
/// ledger store implements the same rules in a single upsert statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub key: String,
    /// Lifetime failures since the last success.
    pub failure_count: u32,
    pub last_failure_date: Option<NaiveDate>,
    pub consecutive_days: u32,
    pub last_success_date: Option<NaiveDate>,
}

impl FailureRecord {
    /// Record created by the first failure for a key.
    pub fn first_failure(key: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            key: key.into(),
            failure_count: 1,
            last_failure_date: Some(today),
            consecutive_days: 1,
            last_success_date: None,
        }
    }

    /// State after one more failure on `today`.
    ///
    /// The streak grows only when the previous failure was yesterday. A repeat
    /// failure on the same day keeps the streak as is; any gap resets it to 1.
    pub fn after_failure(&self, today: NaiveDate) -> Self {
        let yesterday = today.checked_sub_days(Days::new(1));
        let consecutive_days = match self.last_failure_date {
            Some(last) if Some(last) == yesterday => self.consecutive_days + 1,
            Some(last) if last == today => self.consecutive_days.max(1),
            _ => 1,
        };

        Self {
            key: self.key.clone(),
            failure_count: self.failure_count.saturating_add(1),
            last_failure_date: Some(today),
            consecutive_days,
            last_success_date: self.last_success_date,
        }
    }

    /// State after a success on `today`.
    pub fn after_success(&self, today: NaiveDate) -> Self {
        Self {
            key: self.key.clone(),
            failure_count: 0,
            last_failure_date: self.last_failure_date,
            consecutive_days: 0,
            last_success_date: Some(today),
        }
    }
}

/// Display metadata for an item, attached to escalation alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContext {
    pub name: String,
    pub image: Option<String>,
    /// Groupings the item belongs to (e.g. the boxes it is sold in).
    pub groups: Vec<String>,
}

impl ItemContext {
    /// Used when the lookup fails or finds nothing.
    pub fn placeholder() -> Self {
        Self {
            name: "unknown item".to_string(),
            image: None,
            groups: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}
