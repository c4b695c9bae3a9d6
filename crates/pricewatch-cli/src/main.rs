use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pricewatch_client::{HttpPageDriver, PageSelectors, WebhookTransport};
use pricewatch_core::traits::{LedgerStore, PageDriver};
use pricewatch_core::{
    AlertSink, Backoff, CycleSummary, Dispatcher, JobFilter, PipelineConfig, ResourceKind,
    ResourcePool, TracingDispatchReporter,
};
use pricewatch_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Batch price observation with failure tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Plain HTTP fetch, for server-rendered pages
    Http,
    /// Headless Chromium (requires the `browser` feature)
    Browser,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pricing cycle over every eligible item
    Run {
        /// Number of parallel workers
        #[arg(short, long, env = "PRICEWATCH_WORKERS", default_value_t = 2)]
        workers: usize,

        /// Page driver backend
        #[arg(long, value_enum, env = "PRICEWATCH_BACKEND", default_value = "http")]
        backend: Backend,

        /// Attempts per item, including the first
        #[arg(long, default_value_t = 2)]
        max_attempts: u32,

        /// Consecutive failing days before a critical alert
        #[arg(long, env = "PRICEWATCH_ESCALATION_THRESHOLD", default_value_t = 2)]
        escalation_threshold: u32,

        /// Seconds to wait for a page to settle
        #[arg(long, default_value_t = 20)]
        fetch_timeout_secs: u64,

        /// Milliseconds between worker start-ups
        #[arg(long, default_value_t = 3000)]
        stagger_ms: u64,

        /// Lower bound of the retry backoff in milliseconds
        #[arg(long, default_value_t = 1000)]
        backoff_min_ms: u64,

        /// Upper bound of the retry backoff in milliseconds
        #[arg(long, default_value_t = 2000)]
        backoff_max_ms: u64,

        /// Multiplier applied to the mean listing price
        #[arg(long, default_value_t = 1.10)]
        markup: f64,

        /// Only price the first N eligible items
        #[arg(long)]
        limit: Option<usize>,

        /// Also price items whose price is maintained by hand
        #[arg(long, default_value_t = false)]
        include_manual: bool,

        /// CSS selector for price nodes
        #[arg(long, env = "PRICEWATCH_PRICE_SELECTOR")]
        price_selector: Option<String>,

        /// CSS selector that appears once listings have rendered
        #[arg(long, env = "PRICEWATCH_READY_SELECTOR")]
        ready_selector: Option<String>,

        /// Webhook for per-item notices
        #[arg(long, env = "PRICEWATCH_NOTICE_WEBHOOK")]
        notice_webhook: Option<String>,

        /// Webhook for escalations (falls back to the notice webhook)
        #[arg(long, env = "PRICEWATCH_CRITICAL_WEBHOOK")]
        critical_webhook: Option<String>,

        /// Print the cycle summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List items currently on a failure streak
    Failures {
        /// Minimum consecutive failing days
        #[arg(short, long, default_value_t = 2)]
        min_days: u32,
    },

    /// Show the failure record for one item
    Ledger {
        /// Item key
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workers,
            backend,
            max_attempts,
            escalation_threshold,
            fetch_timeout_secs,
            stagger_ms,
            backoff_min_ms,
            backoff_max_ms,
            markup,
            limit,
            include_manual,
            price_selector,
            ready_selector,
            notice_webhook,
            critical_webhook,
            json,
        } => {
            let backoff = Backoff::new(
                Duration::from_millis(backoff_min_ms),
                Duration::from_millis(backoff_max_ms),
            )
            .map_err(|e| anyhow::anyhow!(e))?;
            let config = PipelineConfig::default()
                .with_worker_count(workers)
                .with_max_attempts(max_attempts)
                .with_escalation_threshold(escalation_threshold)
                .with_fetch_timeout(Duration::from_secs(fetch_timeout_secs))
                .with_stagger(Duration::from_millis(stagger_ms))
                .with_backoff(backoff)
                .with_markup(markup);
            config.validate().map_err(|e| anyhow::anyhow!(e))?;

            let mut filter = JobFilter::default();
            if include_manual {
                filter = filter.include_manually_priced();
            }
            if let Some(limit) = limit {
                filter = filter.with_limit(limit);
            }

            let mut selectors = PageSelectors::default();
            if let Some(price) = price_selector {
                selectors = selectors.with_price(price);
            }
            if let Some(ready) = ready_selector {
                selectors = selectors.with_ready(ready);
            }

            let transport = WebhookTransport::new(notice_webhook, critical_webhook)
                .map_err(|e| anyhow::anyhow!(e))?;
            let db = connect_db().await?;

            let summary = run_and_close(backend, &selectors, &db, transport, config, &filter).await?;
            print_summary(&summary, json)?;
        }
        Commands::Failures { min_days } => {
            let db = connect_db().await?;
            let result = cmd_failures(&db, min_days).await;
            db.close().await;
            result?;
        }
        Commands::Ledger { key } => {
            let db = connect_db().await?;
            let result = cmd_ledger(&db, &key).await;
            db.close().await;
            result?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

/// Run one cycle on `backend`, then close the database whatever the outcome.
async fn run_and_close(
    backend: Backend,
    selectors: &PageSelectors,
    db: &Database,
    transport: WebhookTransport,
    config: PipelineConfig,
    filter: &JobFilter,
) -> Result<CycleSummary> {
    let summary = match backend {
        Backend::Http => http_cycle(selectors, db, transport, config, filter).await,
        Backend::Browser => browser_cycle(selectors, db, transport, config, filter).await,
    };
    db.close().await;
    summary
}

async fn http_cycle(
    selectors: &PageSelectors,
    db: &Database,
    transport: WebhookTransport,
    config: PipelineConfig,
    filter: &JobFilter,
) -> Result<CycleSummary> {
    let pool = ResourcePool::build(ResourceKind::Worker, config.worker_count, |_| {
        let selectors = selectors.clone();
        async move { HttpPageDriver::new(&selectors) }
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))?;
    cmd_run(pool, db, transport, config, filter).await
}

#[cfg(feature = "browser")]
async fn browser_cycle(
    selectors: &PageSelectors,
    db: &Database,
    transport: WebhookTransport,
    config: PipelineConfig,
    filter: &JobFilter,
) -> Result<CycleSummary> {
    use pricewatch_client::BrowserPageDriver;

    let pool = ResourcePool::build(ResourceKind::Worker, config.worker_count, |_| {
        BrowserPageDriver::launch(selectors.clone())
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))?;
    cmd_run(pool, db, transport, config, filter).await
}

#[cfg(not(feature = "browser"))]
async fn browser_cycle(
    _selectors: &PageSelectors,
    _db: &Database,
    _transport: WebhookTransport,
    _config: PipelineConfig,
    _filter: &JobFilter,
) -> Result<CycleSummary> {
    anyhow::bail!("this build has no browser support; rebuild with `--features browser`")
}

async fn cmd_run<W: PageDriver>(
    workers: ResourcePool<W>,
    db: &Database,
    transport: WebhookTransport,
    config: PipelineConfig,
    filter: &JobFilter,
) -> Result<CycleSummary> {
    let items = db.item_repo();
    let alerts = AlertSink::new(transport, items.clone());
    let dispatcher = Dispatcher::new(workers, items.clone(), db.ledger_repo(), alerts, config);

    // Ctrl-C stops new jobs from starting; in-flight jobs finish.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight jobs");
            interrupt.cancel();
        }
    });

    let summary = dispatcher
        .run(&items, filter, cancel, Arc::new(TracingDispatchReporter))
        .await;
    dispatcher.shutdown().await;

    summary.map_err(|e| anyhow::anyhow!(e))
}

fn print_summary(summary: &CycleSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Cycle complete: {} items", summary.total);
    println!("  priced:    {}", summary.committed);
    println!("  no price:  {}", summary.absent);
    println!("  escalated: {}", summary.escalated);
    if summary.skipped > 0 {
        println!("  skipped:   {}", summary.skipped);
    }
    if summary.anomalies > 0 {
        println!("  anomalies: {}", summary.anomalies);
    }
    Ok(())
}

async fn cmd_failures(db: &Database, min_days: u32) -> Result<()> {
    let streaks = db
        .ledger_repo()
        .list_streaks(min_days)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if streaks.is_empty() {
        println!("No items failing for {min_days} or more consecutive days");
        return Ok(());
    }

    println!("Items failing for {min_days}+ consecutive days:\n");
    for record in &streaks {
        let last = record
            .last_failure_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>3} days  {:>4} failures  last {}",
            record.key, record.consecutive_days, record.failure_count, last
        );
    }
    println!("\nTotal: {} items", streaks.len());
    Ok(())
}

async fn cmd_ledger(db: &Database, key: &str) -> Result<()> {
    let record = db
        .ledger_repo()
        .get(key)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match record {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No failure record for {key}"),
    }
    Ok(())
}
