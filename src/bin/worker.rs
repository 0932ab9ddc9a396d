//! Background worker: runs queued catalog scans and drains the dead-letter
//! retry queue.
//!
//! Scans are picked up one at a time from Redis, which is what serializes
//! scan execution. Between scans the worker sweeps `failed_jobs` for entries
//! whose retry time has passed and re-attempts them through the same
//! caption + write-back path a scan uses.

use alt_text_engine::{
    config::AppConfig,
    db::{self, failed_job_queries, settings_queries, store::PgScanStore},
    services::{
        captioner::CaptionGenerator,
        queue::ScanQueue,
        scanner,
        shopify::ShopifyClient,
        vision::OpenAiVision,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

/// Dead-letter jobs re-attempted per sweep.
const RETRY_BATCH_SIZE: i64 = 10;

/// Delay before a rescheduled job becomes due again.
const RESCHEDULE_DELAY_SECS: i64 = 120;

struct Worker {
    db: PgPool,
    queue: ScanQueue,
    shopify: ShopifyClient,
    captions: CaptionGenerator,
    store: PgScanStore,
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting alt-text worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Expose this process's metrics on its own scrape port; the scan and
    // retry pipelines record here, not in the API server.
    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .expect("Invalid METRICS_ADDR value");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");

    metrics::describe_histogram!(
        "scan_duration_seconds",
        "Time to run one full catalog scan"
    );
    metrics::describe_histogram!(
        "caption_generation_seconds",
        "Time to generate one alt-text caption"
    );
    metrics::describe_counter!("scans_completed_total", "Total catalog scans completed");
    metrics::describe_counter!(
        "images_updated_total",
        "Total images that received new alt text"
    );
    metrics::describe_counter!(
        "images_failed_total",
        "Total images whose processing failed"
    );
    metrics::describe_counter!(
        "failed_jobs_recovered_total",
        "Dead-letter jobs recovered by the background retry sweep"
    );
    metrics::describe_counter!(
        "failed_jobs_rescheduled_total",
        "Dead-letter jobs rescheduled after an unsuccessful retry"
    );

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let queue = ScanQueue::new(&config.redis_url).expect("Failed to initialize scan queue");

    let shopify = ShopifyClient::new(&config.shopify_access_token, &config.shopify_api_version)
        .expect("Failed to initialize Shopify client");

    let vision = OpenAiVision::new(config.openai_api_key.clone(), config.openai_model.clone());
    let captions = CaptionGenerator::new(db_pool.clone(), Arc::new(vision));

    let worker = Worker {
        store: PgScanStore::new(db_pool.clone()),
        db: db_pool,
        queue,
        shopify,
        captions,
    };

    tracing::info!("Worker ready, starting processing loop");

    // Main processing loop: queued scans take priority, idle time goes to
    // the dead-letter sweep.
    loop {
        match process_next_scan(&worker).await {
            Ok(true) => {
                tracing::debug!("Scan processed, checking for next");
            }
            Ok(false) => match sweep_due_jobs(&worker).await {
                Ok(0) => sleep(Duration::from_millis(POLL_INTERVAL_MS)).await,
                Ok(retried) => {
                    tracing::debug!(retried, "dead-letter sweep finished");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dead-letter sweep failed");
                    sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Error processing scan, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Run the next queued scan, if any.
/// Returns Ok(true) if a scan was processed, Ok(false) if the queue was empty.
async fn process_next_scan(worker: &Worker) -> Result<bool, Box<dyn std::error::Error>> {
    let queued = match worker.queue.dequeue().await? {
        Some(s) => s,
        None => return Ok(false),
    };

    tracing::info!(
        shop = %queued.shop,
        force_all = queued.force_all,
        "Processing queued scan"
    );

    let result = scanner::run_scan(
        &worker.store,
        &worker.shopify,
        &worker.captions,
        &queued.shop,
        queued.force_all,
    )
    .await;

    // The queue entry is finished either way; an aborted scan stays visible
    // through its `running` record, not through the queue.
    worker.queue.complete(&queued).await?;

    match result {
        Ok(summary) => {
            tracing::info!(
                shop = %queued.shop,
                scan_id = %summary.scan_id,
                status = %summary.status,
                images_processed = summary.totals.images_processed,
                images_failed = summary.totals.images_failed,
                "Scan completed"
            );
        }
        Err(e) => {
            tracing::error!(shop = %queued.shop, error = %e, "Scan aborted");
        }
    }

    Ok(true)
}

/// Re-attempt due dead-letter jobs. Returns how many jobs were attempted.
async fn sweep_due_jobs(worker: &Worker) -> Result<usize, Box<dyn std::error::Error>> {
    let due = failed_job_queries::list_due(&worker.db, RETRY_BATCH_SIZE).await?;
    let attempted = due.len();

    for job in due {
        failed_job_queries::mark_retrying(&worker.db, job.id).await?;
        let settings = settings_queries::get_or_create(&worker.db, &job.shop).await?;

        match scanner::retry_failed_job(&worker.shopify, &worker.captions, &settings, &job).await {
            Ok(caption) => {
                failed_job_queries::remove(&worker.db, job.id).await?;
                metrics::counter!("failed_jobs_recovered_total").increment(1);
                tracing::info!(
                    job_id = %job.id,
                    shop = %job.shop,
                    image_id = %job.image_id,
                    caption_chars = caption.chars().count(),
                    "Dead-letter retry succeeded"
                );
            }
            Err(failure) => {
                let updated = failed_job_queries::reschedule(
                    &worker.db,
                    &job,
                    chrono::Duration::seconds(RESCHEDULE_DELAY_SECS),
                )
                .await?;
                metrics::counter!("failed_jobs_rescheduled_total").increment(1);
                tracing::warn!(
                    job_id = %job.id,
                    shop = %job.shop,
                    status = %updated.status,
                    retry_count = updated.retry_count,
                    error = %failure,
                    "Dead-letter retry failed"
                );
            }
        }
    }

    Ok(attempted)
}
