use alt_text_engine::{
    config::AppConfig,
    db::{self, failed_job_queries, scan_queries, settings_queries},
    models::failed_job::{FailedJobStatus, NewFailedJob},
    models::scan::{NewProcessedImage, ProcessedImageStatus, ScanStatus, ScanTotals},
    models::settings::{CaptionLength, CaptionStyle, SettingsUpdate},
    services::queue::{QueuedScan, ScanQueue},
    services::retry,
};
use uuid::Uuid;

/// Integration test: persistence and dispatch round-trips
///
/// This test verifies the complete integration:
/// 1. Database connection and schema
/// 2. Shop settings (lazy creation, upsert)
/// 3. Scan lifecycle (create/record/finalize/read back)
/// 4. Dead-letter queue lifecycle (enqueue/reschedule/expire/remove)
/// 5. Redis scan dispatch (enqueue/dequeue/complete)
///
/// Note: This requires a running PostgreSQL and Redis instance
/// configured via environment variables.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_full_integration() {
    // Load config from environment
    let config = AppConfig::from_env().expect("Failed to load config");

    // Initialize database
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");

    let queue = ScanQueue::new(&config.redis_url).expect("Failed to initialize queue");

    // Unique shop per run so reruns never collide
    let shop = format!("it-{}.myshopify.com", Uuid::new_v4());

    // 1. Settings are lazily created with defaults on first read
    let settings = settings_queries::get_or_create(&db_pool, &shop)
        .await
        .expect("Failed to get-or-create settings");

    assert_eq!(settings.shop, shop);
    assert_eq!(settings.alt_text_style, CaptionStyle::Professional);
    assert_eq!(settings.alt_text_length, CaptionLength::Medium);
    assert_eq!(settings.batch_size, 5);
    assert!(settings.auto_retry);
    assert_eq!(settings.max_retries, 3);

    // A second read returns the same row, not a new one
    let again = settings_queries::get_or_create(&db_pool, &shop)
        .await
        .expect("Failed to re-read settings");
    assert_eq!(again.id, settings.id);

    // 2. Upsert replaces the stored values
    let update = SettingsUpdate {
        shop: shop.clone(),
        alt_text_style: CaptionStyle::Creative,
        alt_text_length: CaptionLength::Long,
        custom_prompt: Some("Describe the product plainly.".to_string()),
        batch_size: 8,
        auto_retry: false,
        max_retries: 5,
    };
    let saved = settings_queries::upsert(&db_pool, &update)
        .await
        .expect("Failed to upsert settings");

    assert_eq!(saved.id, settings.id);
    assert_eq!(saved.alt_text_style, CaptionStyle::Creative);
    assert_eq!(saved.alt_text_length, CaptionLength::Long);
    assert_eq!(saved.custom_prompt.as_deref(), Some("Describe the product plainly."));
    assert!(!saved.auto_retry);
    assert_eq!(saved.max_retries, 5);

    // 3. Scan lifecycle: created running, visible to the overlap guard
    let scan = scan_queries::create_scan(&db_pool, &shop, false)
        .await
        .expect("Failed to create scan");

    assert_eq!(scan.status, ScanStatus::Running);
    assert!(!scan.force_all);
    assert!(scan.completed_at.is_none());

    let cutoff = chrono::Utc::now() - chrono::Duration::hours(24);
    let active = scan_queries::find_active_scan(&db_pool, &shop, cutoff)
        .await
        .expect("Failed to query active scan")
        .expect("Active scan not found");
    assert_eq!(active.id, scan.id);

    // 4. Per-image outcome rows
    let product_id = "gid://shopify/Product/100".to_string();
    let image_id = "gid://shopify/MediaImage/200".to_string();
    let image_url = "https://cdn.example.com/mug.jpg".to_string();

    scan_queries::record_image(
        &db_pool,
        &NewProcessedImage {
            scan_id: scan.id,
            product_id: product_id.clone(),
            product_title: "Blue Mug".to_string(),
            image_id: image_id.clone(),
            image_url: image_url.clone(),
            previous_alt_text: None,
            new_alt_text: "A blue ceramic mug.".to_string(),
            status: ProcessedImageStatus::Success,
            error_message: None,
        },
    )
    .await
    .expect("Failed to record success outcome");

    scan_queries::record_image(
        &db_pool,
        &NewProcessedImage {
            scan_id: scan.id,
            product_id: product_id.clone(),
            product_title: "Blue Mug".to_string(),
            image_id: "gid://shopify/MediaImage/201".to_string(),
            image_url: "https://cdn.example.com/mug-side.jpg".to_string(),
            previous_alt_text: None,
            new_alt_text: String::new(),
            status: ProcessedImageStatus::Failed,
            error_message: Some("request timeout after 30s".to_string()),
        },
    )
    .await
    .expect("Failed to record failed outcome");

    let outcomes = scan_queries::list_processed_images(&db_pool, scan.id)
        .await
        .expect("Failed to list outcomes");
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, ProcessedImageStatus::Success);
    assert_eq!(outcomes[1].status, ProcessedImageStatus::Failed);

    // 5. Finalize and read back
    let totals = ScanTotals {
        total_products: 1,
        total_images: 2,
        missing_alt_text: 2,
        images_processed: 1,
        images_failed: 1,
        images_skipped: 0,
    };
    scan_queries::finalize_scan(&db_pool, scan.id, &totals, totals.terminal_status())
        .await
        .expect("Failed to finalize scan");

    let finished = scan_queries::get_scan(&db_pool, scan.id)
        .await
        .expect("Failed to get scan")
        .expect("Scan not found");

    assert_eq!(finished.status, ScanStatus::CompletedWithErrors);
    assert_eq!(finished.images_processed, 1);
    assert_eq!(finished.images_failed, 1);
    assert!(finished.completed_at.is_some());

    // The finished scan no longer blocks new ones
    let active = scan_queries::find_active_scan(&db_pool, &shop, cutoff)
        .await
        .expect("Failed to re-query active scan");
    assert!(active.is_none());

    let listed = scan_queries::list_scans(&db_pool, &shop, 10)
        .await
        .expect("Failed to list scans");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, scan.id);

    let aggregates = scan_queries::scan_aggregates(&db_pool, &shop)
        .await
        .expect("Failed to aggregate scans");
    assert_eq!(aggregates.total_scans, 1);
    assert_eq!(aggregates.images_processed, 1);
    assert_eq!(aggregates.images_failed, 1);
    assert!(aggregates.last_scan_at.is_some());

    // 6. Dead-letter lifecycle: enqueue leads retries by 60 seconds
    let job = failed_job_queries::enqueue(
        &db_pool,
        &NewFailedJob {
            shop: shop.clone(),
            product_id,
            product_title: "Blue Mug".to_string(),
            image_id,
            image_url,
            error_message: "request timeout after 30s".to_string(),
            max_retries: 3,
        },
    )
    .await
    .expect("Failed to enqueue dead-letter job");

    assert_eq!(job.status, FailedJobStatus::Pending);
    assert_eq!(job.retry_count, 0);
    assert!(job.next_retry_at > chrono::Utc::now() + chrono::Duration::seconds(30));
    assert!(job.last_attempt_at.is_none());

    // Not yet due, so the sweep must not see it
    let due = failed_job_queries::list_due(&db_pool, 100)
        .await
        .expect("Failed to list due jobs");
    assert!(due.iter().all(|j| j.id != job.id));

    let open = failed_job_queries::count_open(&db_pool, &shop)
        .await
        .expect("Failed to count open jobs");
    assert_eq!(open, 1);

    // 7. Retrying marks the attempt
    failed_job_queries::mark_retrying(&db_pool, job.id)
        .await
        .expect("Failed to mark retrying");

    let listed = failed_job_queries::list_for_shop(&db_pool, &shop, 10)
        .await
        .expect("Failed to list shop jobs");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, FailedJobStatus::Retrying);
    assert!(listed[0].last_attempt_at.is_some());

    // 8. Rescheduling with zero delay makes the job immediately due
    let job = failed_job_queries::reschedule(&db_pool, &listed[0], chrono::Duration::zero())
        .await
        .expect("Failed to reschedule");

    assert_eq!(job.status, FailedJobStatus::Pending);
    assert_eq!(job.retry_count, 1);

    let due = failed_job_queries::list_due(&db_pool, 100)
        .await
        .expect("Failed to list due jobs");
    assert!(due.iter().any(|j| j.id == job.id));

    // 9. The retry budget expires into failed_permanent
    let job = failed_job_queries::reschedule(&db_pool, &job, chrono::Duration::zero())
        .await
        .expect("Failed to reschedule");
    assert_eq!(job.status, FailedJobStatus::Pending);
    assert_eq!(job.retry_count, 2);

    let job = failed_job_queries::reschedule(&db_pool, &job, chrono::Duration::zero())
        .await
        .expect("Failed to reschedule");
    assert_eq!(job.status, FailedJobStatus::FailedPermanent);
    assert_eq!(job.retry_count, 3);

    // Terminal jobs are invisible to the sweep and to the open count
    let due = failed_job_queries::list_due(&db_pool, 100)
        .await
        .expect("Failed to list due jobs");
    assert!(due.iter().all(|j| j.id != job.id));

    let open = failed_job_queries::count_open(&db_pool, &shop)
        .await
        .expect("Failed to count open jobs");
    assert_eq!(open, 0);

    // 10. Removal after a successful recovery
    failed_job_queries::remove(&db_pool, job.id)
        .await
        .expect("Failed to remove job");

    let listed = failed_job_queries::list_for_shop(&db_pool, &shop, 10)
        .await
        .expect("Failed to list shop jobs");
    assert!(listed.is_empty());

    // 11. Redis dispatch round-trip
    let queued = QueuedScan {
        shop: shop.clone(),
        force_all: true,
    };
    queue.enqueue(&queued).await.expect("Failed to enqueue scan");

    assert!(
        queue.queue_depth().await.expect("Failed to read depth") >= 1,
        "queued scan should be visible in the depth gauge"
    );

    let dequeued = queue
        .dequeue()
        .await
        .expect("Failed to dequeue")
        .expect("No scan in queue");

    assert_eq!(dequeued.shop, shop);
    assert!(dequeued.force_all);

    queue
        .complete(&dequeued)
        .await
        .expect("Failed to complete scan in queue");

    queue.health_check().await.expect("Redis health check failed");

    println!("✅ All integration tests passed!");
}

/// The dead-letter gate classifies rendered pipeline errors by their Display
/// text, so the error messages and the classifier patterns have to stay in
/// agreement.
#[test]
fn test_rendered_errors_classify_for_retry() {
    use alt_text_engine::services::captioner::CaptionError;
    use alt_text_engine::services::shopify::ShopifyError;
    use alt_text_engine::services::vision::VisionError;

    // Rate-limit exhaustion keeps its retryable phrasing end to end
    let err = CaptionError::RateLimited {
        attempts: 3,
        message: "quota exceeded".to_string(),
    };
    assert!(retry::is_retryable(&err.to_string()));

    // A 429 from the storefront API is retryable by its status alone
    let err = ShopifyError::Api {
        status: 429,
        message: "Throttled".to_string(),
    };
    assert!(retry::is_retryable(&err.to_string()));

    // Provider timeouts surface through the exhaustion wrapper
    let inner = VisionError::Request {
        message: "connect ETIMEDOUT 104.18.2.1:443".to_string(),
    };
    let err = CaptionError::Exhausted {
        attempts: 3,
        message: inner.to_string(),
    };
    assert!(retry::is_retryable(&err.to_string()));

    // Permanent rejections never reach the dead-letter queue
    let err = ShopifyError::GraphQl("Field 'altText' doesn't accept null".to_string());
    assert!(!retry::is_retryable(&err.to_string()));
}

/// The worker deserializes exactly this JSON shape off the Redis list.
#[test]
fn test_queued_scan_wire_format() {
    let queued = QueuedScan {
        shop: "demo.myshopify.com".to_string(),
        force_all: false,
    };
    let payload = serde_json::to_string(&queued).expect("serialize");
    assert_eq!(payload, r#"{"shop":"demo.myshopify.com","force_all":false}"#);

    let parsed: QueuedScan =
        serde_json::from_str(r#"{"shop":"demo.myshopify.com","force_all":true}"#).expect("parse");
    assert_eq!(parsed.shop, "demo.myshopify.com");
    assert!(parsed.force_all);
}
