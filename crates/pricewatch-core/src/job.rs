use std::fmt;

use serde::{Deserialize, Serialize};

/// One unit of work: an item key plus the locator its price is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobReference {
    pub key: String,
    pub locator: String,
}

impl JobReference {
    pub fn new(key: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            locator: locator.into(),
        }
    }
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.locator)
    }
}

/// Filter applied when reading eligible jobs for a cycle.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Skip items whose price is maintained by hand.
    pub exclude_manually_priced: bool,
    pub limit: Option<usize>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            exclude_manually_priced: true,
            limit: None,
        }
    }
}

impl JobFilter {
    pub fn include_manually_priced(mut self) -> Self {
        self.exclude_manually_priced = false;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The aggregated result for one job in one cycle.
///
/// `value` is `None` when every attempt failed; it is never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: String,
    pub value: Option<f64>,
    pub attempt_count: u32,
    pub succeeded: bool,
}

impl Observation {
    pub fn priced(key: impl Into<String>, value: f64, attempt_count: u32) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            attempt_count,
            succeeded: true,
        }
    }

    pub fn absent(key: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            key: key.into(),
            value: None,
            attempt_count,
            succeeded: false,
        }
    }
}
