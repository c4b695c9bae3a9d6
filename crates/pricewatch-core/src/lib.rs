pub mod aggregate;
pub mod alert;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extraction;
pub mod job;
pub mod ledger;
pub mod models;
pub mod pool;
pub mod retry;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use aggregate::Aggregator;
pub use alert::{AlertEvent, AlertSink, Severity};
pub use config::PipelineConfig;
pub use dispatcher::{
    CycleSummary, DispatchEvent, DispatchReporter, Dispatcher, TracingDispatchReporter,
};
pub use error::{AppError, FailureKind};
pub use extraction::{ExtractionClient, parse_price};
pub use job::{JobFilter, JobReference, Observation};
pub use ledger::FailureLedger;
pub use models::{FailureRecord, ItemContext, SampleSet};
pub use pool::{ResourceKind, ResourcePool, Slot};
pub use retry::{AttemptOutcome, Backoff, JobState};
pub use traits::{
    ItemDirectory, JobSource, LedgerStore, NotificationTransport, NullTransport,
    ObservationStore, PageDriver,
};
