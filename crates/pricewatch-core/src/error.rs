use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for Pricewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The rendering backend failed (launch, navigation, DevTools protocol).
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Content did not become stable before the wait ceiling.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Content changed underneath us while it was being read.
    #[error("Stale content: {0}")]
    StaleContent(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Outbound notification could not be delivered.
    #[error("Notification error: {0}")]
    NotificationError(String),

    /// A pool could not build a single usable slot.
    #[error("No {0} slots could be constructed")]
    PoolExhausted(String),

    /// The pool was closed while waiting or before acquiring.
    #[error("{0} pool is closed")]
    PoolClosed(String),

    /// A slot was handed back to a pool that did not issue it.
    #[error("Slot does not belong to the {0} pool")]
    ForeignSlot(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Coarse classification of a failed attempt, used by the retry state machine
/// and carried in [`crate::retry::AttemptOutcome::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    StaleContent,
    Fetch,
    Persistence,
    Resource,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::StaleContent => "stale_content",
            FailureKind::Fetch => "fetch",
            FailureKind::Persistence => "persistence",
            FailureKind::Resource => "resource",
            FailureKind::Internal => "internal",
        }
    }

    /// Whether another attempt at the same job can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Timeout
            | FailureKind::StaleContent
            | FailureKind::Fetch
            | FailureKind::Persistence => true,
            FailureKind::Resource | FailureKind::Internal => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Timeout(_) => FailureKind::Timeout,
            AppError::StaleContent(_) => FailureKind::StaleContent,
            AppError::HttpError(_) | AppError::NetworkError(_) | AppError::BrowserError(_) => {
                FailureKind::Fetch
            }
            AppError::DatabaseError(_) => FailureKind::Persistence,
            AppError::PoolExhausted(_) | AppError::PoolClosed(_) | AppError::ForeignSlot(_) => {
                FailureKind::Resource
            }
            AppError::NotificationError(_)
            | AppError::ConfigError(_)
            | AppError::SerializationError(_)
            | AppError::Generic(_) => FailureKind::Internal,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
