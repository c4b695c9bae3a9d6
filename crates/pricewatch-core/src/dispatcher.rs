use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::Aggregator;
use crate::alert::{AlertEvent, AlertSink};
use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::extraction::ExtractionClient;
use crate::job::{JobFilter, JobReference, Observation};
use crate::ledger::FailureLedger;
use crate::models::FailureRecord;
use crate::pool::ResourcePool;
use crate::retry::{AttemptOutcome, Commit, JobState};
use crate::traits::{
    ItemDirectory, JobSource, LedgerStore, NotificationTransport, ObservationStore, PageDriver,
};

/// Events emitted during a cycle for monitoring/logging.
#[derive(Debug, Clone)]
pub enum DispatchEvent<'a> {
    CycleStarted {
        cycle_id: Uuid,
        jobs: usize,
        workers: usize,
    },
    WorkerStarted {
        worker: usize,
        jobs: usize,
    },
    JobStarted {
        worker: usize,
        job: &'a JobReference,
    },
    AttemptFailed {
        job: &'a JobReference,
        attempt: u32,
        outcome: &'a AttemptOutcome,
        will_retry: bool,
    },
    JobCommitted {
        job: &'a JobReference,
        observation: &'a Observation,
    },
    Escalated {
        job: &'a JobReference,
        record: &'a FailureRecord,
    },
    /// A side effect failed after the job's outcome was decided.
    Anomaly {
        job: &'a JobReference,
        error: &'a str,
    },
    WorkerStopped {
        worker: usize,
        processed: usize,
        skipped: usize,
    },
    CycleFinished {
        cycle_id: Uuid,
        summary: &'a CycleSummary,
    },
}

/// Trait for receiving dispatch events (decoupled logging).
pub trait DispatchReporter: Send + Sync {
    fn report(&self, event: DispatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatchReporter;

impl DispatchReporter for TracingDispatchReporter {
    fn report(&self, event: DispatchEvent<'_>) {
        match event {
            DispatchEvent::CycleStarted {
                cycle_id,
                jobs,
                workers,
            } => {
                tracing::info!(%cycle_id, jobs, workers, "Cycle started");
            }
            DispatchEvent::WorkerStarted { worker, jobs } => {
                tracing::info!(worker, jobs, "Worker started");
            }
            DispatchEvent::JobStarted { worker, job } => {
                tracing::debug!(worker, key = %job.key, locator = %job.locator, "Processing job");
            }
            DispatchEvent::AttemptFailed {
                job,
                attempt,
                outcome,
                will_retry,
            } => match outcome {
                AttemptOutcome::Error { kind, detail } => {
                    tracing::warn!(key = %job.key, attempt, %kind, error = %detail, will_retry, "Attempt failed");
                }
                _ => {
                    tracing::info!(key = %job.key, attempt, will_retry, "No data found");
                }
            },
            DispatchEvent::JobCommitted { job, observation } => match observation.value {
                Some(value) => {
                    tracing::info!(key = %job.key, value, attempts = observation.attempt_count, "Job priced");
                }
                None => {
                    tracing::warn!(key = %job.key, attempts = observation.attempt_count, "Job ended without a price");
                }
            },
            DispatchEvent::Escalated { job, record } => {
                tracing::warn!(
                    key = %job.key,
                    consecutive_days = record.consecutive_days,
                    "Failure streak escalated"
                );
            }
            DispatchEvent::Anomaly { job, error } => {
                tracing::error!(key = %job.key, %error, "Side effect failed");
            }
            DispatchEvent::WorkerStopped {
                worker,
                processed,
                skipped,
            } => {
                tracing::info!(worker, processed, skipped, "Worker stopped");
            }
            DispatchEvent::CycleFinished { cycle_id, summary } => {
                tracing::info!(
                    %cycle_id,
                    total = summary.total,
                    committed = summary.committed,
                    absent = summary.absent,
                    escalated = summary.escalated,
                    skipped = summary.skipped,
                    anomalies = summary.anomalies,
                    "Cycle finished"
                );
            }
        }
    }
}

/// Outcome counts for one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub total: usize,
    /// Jobs that ended with a price.
    pub committed: usize,
    /// Jobs that ended without one.
    pub absent: usize,
    pub escalated: usize,
    /// Jobs never started because of cancellation or a missing worker.
    pub skipped: usize,
    pub anomalies: usize,
    pub observations: Vec<Observation>,
}

impl CycleSummary {
    fn merge(&mut self, other: CycleSummary) {
        self.committed += other.committed;
        self.absent += other.absent;
        self.escalated += other.escalated;
        self.skipped += other.skipped;
        self.anomalies += other.anomalies;
        self.observations.extend(other.observations);
    }
}

/// Split `items` into `workers` chunks, striding so neighbours land on
/// different workers. Chunk `i` gets items `i, i + workers, i + 2*workers, ...`.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut chunks: Vec<Vec<T>> = (0..workers)
        .map(|_| Vec::with_capacity(items.len() / workers + 1))
        .collect();
    for (index, item) in items.into_iter().enumerate() {
        chunks[index % workers].push(item);
    }
    chunks
}

/// Runs pricing cycles over a pool of page drivers.
pub struct Dispatcher<W, S, L, N, D>
where
    W: PageDriver,
    S: ObservationStore,
    L: LedgerStore,
    N: NotificationTransport,
    D: ItemDirectory,
{
    workers: ResourcePool<W>,
    store: S,
    ledger: FailureLedger<L>,
    alerts: AlertSink<N, D>,
    extraction: ExtractionClient,
    aggregator: Aggregator,
    config: PipelineConfig,
}

impl<W, S, L, N, D> Clone for Dispatcher<W, S, L, N, D>
where
    W: PageDriver,
    S: ObservationStore,
    L: LedgerStore,
    N: NotificationTransport,
    D: ItemDirectory,
{
    fn clone(&self) -> Self {
        Self {
            workers: self.workers.clone(),
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            alerts: self.alerts.clone(),
            extraction: self.extraction,
            aggregator: self.aggregator,
            config: self.config.clone(),
        }
    }
}

impl<W, S, L, N, D> Dispatcher<W, S, L, N, D>
where
    W: PageDriver,
    S: ObservationStore,
    L: LedgerStore,
    N: NotificationTransport,
    D: ItemDirectory,
{
    pub fn new(
        workers: ResourcePool<W>,
        store: S,
        ledger_store: L,
        alerts: AlertSink<N, D>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            workers,
            store,
            ledger: FailureLedger::new(ledger_store, config.escalation_threshold),
            alerts,
            extraction: ExtractionClient::new(config.fetch_timeout),
            aggregator: Aggregator::new(config.markup),
            config,
        }
    }

    pub fn ledger(&self) -> &FailureLedger<L> {
        &self.ledger
    }

    /// Read eligible jobs from `source` and run one cycle over them.
    ///
    /// Only a failure to read the job list is an error; per-job failures end
    /// up in the summary.
    pub async fn run<J, R>(
        &self,
        source: &J,
        filter: &JobFilter,
        cancel: CancellationToken,
        reporter: Arc<R>,
    ) -> Result<CycleSummary, AppError>
    where
        J: JobSource,
        R: DispatchReporter + 'static,
    {
        let jobs = source.eligible_jobs(filter).await?;
        Ok(self.run_cycle(jobs, cancel, reporter).await)
    }

    /// Process `jobs` across the worker pool.
    ///
    /// Jobs are striped across one chunk per pooled worker; each chunk is
    /// processed sequentially on its own task. Cancellation is honoured at job
    /// boundaries; jobs not yet started are counted as skipped. Returns once
    /// every chunk has finished and pending alerts have been delivered.
    pub async fn run_cycle<R>(
        &self,
        jobs: Vec<JobReference>,
        cancel: CancellationToken,
        reporter: Arc<R>,
    ) -> CycleSummary
    where
        R: DispatchReporter + 'static,
    {
        let cycle_id = Uuid::new_v4();
        let total = jobs.len();
        let chunks = partition(jobs, self.workers.size());
        reporter.report(DispatchEvent::CycleStarted {
            cycle_id,
            jobs: total,
            workers: chunks.len(),
        });

        let mut set = JoinSet::new();
        for (worker, chunk) in chunks.into_iter().enumerate() {
            if chunk.is_empty() {
                continue;
            }
            let this = self.clone();
            let cancel = cancel.clone();
            let reporter = Arc::clone(&reporter);
            let delay = self.config.stagger * worker as u32;
            set.spawn(async move {
                if !delay.is_zero() {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {}
                    }
                }
                this.run_chunk(worker, chunk, &cancel, reporter.as_ref())
                    .await
            });
        }

        let mut summary = CycleSummary {
            total,
            ..CycleSummary::default()
        };
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(part) => summary.merge(part),
                Err(e) => {
                    summary.anomalies += 1;
                    tracing::error!(%cycle_id, error = %e, "Worker task aborted");
                }
            }
        }

        self.alerts.flush().await;
        reporter.report(DispatchEvent::CycleFinished {
            cycle_id,
            summary: &summary,
        });
        summary
    }

    async fn run_chunk<R>(
        &self,
        worker: usize,
        chunk: Vec<JobReference>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> CycleSummary
    where
        R: DispatchReporter + ?Sized,
    {
        let mut summary = CycleSummary::default();
        if cancel.is_cancelled() {
            summary.skipped = chunk.len();
            return summary;
        }

        let mut slot = match self.workers.acquire().await {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!(worker, error = %e, "No worker available, skipping chunk");
                summary.skipped = chunk.len();
                return summary;
            }
        };
        reporter.report(DispatchEvent::WorkerStarted {
            worker,
            jobs: chunk.len(),
        });

        let mut processed = 0;
        for job in &chunk {
            if cancel.is_cancelled() {
                break;
            }
            reporter.report(DispatchEvent::JobStarted { worker, job });
            let observation = self
                .process_job(&mut *slot, job, &mut summary, reporter)
                .await;
            summary.observations.push(observation);
            processed += 1;
        }
        drop(slot);

        let skipped = chunk.len() - processed;
        summary.skipped += skipped;
        reporter.report(DispatchEvent::WorkerStopped {
            worker,
            processed,
            skipped,
        });
        summary
    }

    /// Drive one job to a terminal state, then apply its side effects.
    async fn process_job<R>(
        &self,
        driver: &mut W,
        job: &JobReference,
        summary: &mut CycleSummary,
        reporter: &R,
    ) -> Observation
    where
        R: DispatchReporter + ?Sized,
    {
        let max_attempts = self.config.max_attempts;
        let mut state = JobState::start();
        let commit = loop {
            state = match state {
                pending @ JobState::Pending { attempt } => {
                    if pending.backoff_due() {
                        let delay = self.config.backoff.sample();
                        tracing::debug!(
                            key = %job.key,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    pending.begin()
                }
                attempting @ JobState::Attempting { attempt } => {
                    let outcome = self.attempt(driver, job, attempt).await;
                    let next = attempting.on_outcome(outcome.clone(), max_attempts);
                    if !outcome.is_success() {
                        reporter.report(DispatchEvent::AttemptFailed {
                            job,
                            attempt,
                            outcome: &outcome,
                            will_retry: !next.is_terminal(),
                        });
                    }
                    next
                }
                JobState::Committed(commit) => break commit,
            };
        };

        self.finish(job, commit, summary, reporter).await
    }

    /// One fetch, extract, aggregate and commit pass.
    async fn attempt(&self, driver: &mut W, job: &JobReference, attempt: u32) -> AttemptOutcome {
        let samples = match self.extraction.fetch_and_extract(driver, job).await {
            Ok(samples) => samples,
            Err(e) => return AttemptOutcome::from_error(&e),
        };

        let Some(value) = self.aggregator.reduce(&samples) else {
            return AttemptOutcome::NoData;
        };

        let observation = Observation::priced(&job.key, value, attempt);
        match self.store.update_observation(&observation).await {
            Ok(()) => {
                tracing::debug!(key = %job.key, samples = samples.len(), value, "Observation committed");
                AttemptOutcome::Success { value }
            }
            Err(e) => AttemptOutcome::from_error(&e),
        }
    }

    async fn finish<R>(
        &self,
        job: &JobReference,
        commit: Commit,
        summary: &mut CycleSummary,
        reporter: &R,
    ) -> Observation
    where
        R: DispatchReporter + ?Sized,
    {
        let Some(value) = commit.value else {
            return self.finish_absent(job, commit, summary, reporter).await;
        };

        let observation = Observation::priced(&job.key, value, commit.attempts);
        summary.committed += 1;
        if let Err(e) = self.ledger.record_success(&job.key).await {
            anomaly(job, &e, summary, reporter);
        }
        reporter.report(DispatchEvent::JobCommitted {
            job,
            observation: &observation,
        });
        observation
    }

    async fn finish_absent<R>(
        &self,
        job: &JobReference,
        commit: Commit,
        summary: &mut CycleSummary,
        reporter: &R,
    ) -> Observation
    where
        R: DispatchReporter + ?Sized,
    {
        let observation = Observation::absent(&job.key, commit.attempts);
        summary.absent += 1;

        // Touches the row without overwriting its last known price.
        if let Err(e) = self.store.update_observation(&observation).await {
            anomaly(job, &e, summary, reporter);
        }

        self.alerts.notify(AlertEvent::NoDataAfterRetries {
            key: job.key.clone(),
            locator: job.locator.clone(),
            attempts: commit.attempts,
            last_error: commit
                .failure
                .as_ref()
                .and_then(|f| f.error_detail())
                .map(str::to_string),
        });

        match self.ledger.record_failure(&job.key).await {
            Ok(record) => {
                if self.ledger.should_escalate(&record) {
                    summary.escalated += 1;
                    reporter.report(DispatchEvent::Escalated {
                        job,
                        record: &record,
                    });
                    self.alerts.escalate(job, record);
                }
            }
            Err(e) => anomaly(job, &e, summary, reporter),
        }

        reporter.report(DispatchEvent::JobCommitted {
            job,
            observation: &observation,
        });
        observation
    }

    /// Close the worker pool and shut every driver down.
    ///
    /// Call after the last cycle has returned; drivers still checked out are
    /// not reached.
    pub async fn shutdown(&self) {
        let drivers = self.workers.close_all();
        tracing::info!(drivers = drivers.len(), "Shutting down workers");
        for mut driver in drivers {
            driver.shutdown().await;
        }
        self.alerts.flush().await;
    }
}

fn anomaly<R>(job: &JobReference, error: &AppError, summary: &mut CycleSummary, reporter: &R)
where
    R: DispatchReporter + ?Sized,
{
    summary.anomalies += 1;
    let error = error.to_string();
    reporter.report(DispatchEvent::Anomaly {
        job,
        error: &error,
    });
}
