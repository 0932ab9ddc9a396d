//! Scan orchestration: the top-level control loop over a shop's catalog.
//!
//! A scan walks every product image, decides what needs captioning, drives
//! the Caption Generator, writes results back to the storefront, and records
//! one outcome row per attempted image. Per-image failures never abort the
//! scan; only catalog fetch and persistence errors propagate. The same
//! generate-and-write-back step is reused by the dead-letter retry sweep.

use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use crate::db::store::ScanStore;
use crate::models::failed_job::{FailedJob, NewFailedJob};
use crate::models::product::{Product, ProductImage, UserError};
use crate::models::scan::{NewProcessedImage, ScanStatus, ScanTotals};
use crate::models::settings::ShopSettings;
use crate::services::captioner::{CaptionRequest, CaptionSource};
use crate::services::retry;
use crate::services::shopify::CatalogSource;

/// Pause after every successful write-back, to stay inside the platform's
/// API rate limits.
pub const WRITE_PAUSE: Duration = Duration::from_secs(2);

/// Outcome message recorded when the provider returns an empty caption.
const NO_CAPTION_MESSAGE: &str = "No alt-text generated";

/// Final shape of one finished scan.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub totals: ScanTotals,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("catalog fetch failed: {0}")]
    Catalog(#[from] crate::services::shopify::ShopifyError),

    #[error("scan persistence failed: {0}")]
    Store(#[from] sqlx::Error),
}

/// Run one full catalog scan for `shop`.
///
/// Creates the Scan record up front, snapshots the catalog once, then
/// processes images strictly sequentially. The record is finalized with
/// aggregate counts and `completed` or `completed_with_errors`; a scan
/// interrupted by a propagated error stays `running`.
pub async fn run_scan(
    store: &dyn ScanStore,
    catalog: &dyn CatalogSource,
    captions: &dyn CaptionSource,
    shop: &str,
    force_all: bool,
) -> Result<ScanSummary, ScanError> {
    let started = std::time::Instant::now();
    let scan = store.create_scan(shop, force_all).await?;
    let settings = store.shop_settings(shop).await?;

    tracing::info!(shop, scan_id = %scan.id, force_all, "starting catalog scan");

    // A scan always snapshots the catalog from the beginning.
    let products = catalog.fetch_all_products(shop, None).await?;

    let mut totals = ScanTotals {
        total_products: products.len() as i32,
        ..ScanTotals::default()
    };

    for product in &products {
        for image in &product.images {
            totals.total_images += 1;

            if image.has_alt_text() && !force_all {
                totals.images_skipped += 1;
                continue;
            }
            totals.missing_alt_text += 1;

            match process_image(store, catalog, captions, &settings, scan.id, shop, product, image)
                .await?
            {
                ImageOutcome::Updated => totals.images_processed += 1,
                ImageOutcome::Failed => totals.images_failed += 1,
            }
        }
    }

    let status = totals.terminal_status();
    store.finalize_scan(scan.id, &totals, status).await?;

    metrics::counter!("scans_completed_total").increment(1);
    metrics::counter!("images_updated_total").increment(totals.images_processed as u64);
    metrics::counter!("images_failed_total").increment(totals.images_failed as u64);
    metrics::histogram!("scan_duration_seconds").record(started.elapsed().as_secs_f64());

    tracing::info!(
        shop,
        scan_id = %scan.id,
        status = %status,
        total_products = totals.total_products,
        total_images = totals.total_images,
        missing_alt_text = totals.missing_alt_text,
        images_processed = totals.images_processed,
        images_failed = totals.images_failed,
        images_skipped = totals.images_skipped,
        "catalog scan finished"
    );

    Ok(ScanSummary {
        scan_id: scan.id,
        status,
        totals,
    })
}

enum ImageOutcome {
    Updated,
    Failed,
}

/// Caption one image and write it back, recording the outcome row.
///
/// Store errors propagate; everything else is folded into the returned
/// outcome so the surrounding scan keeps going.
#[allow(clippy::too_many_arguments)]
async fn process_image(
    store: &dyn ScanStore,
    catalog: &dyn CatalogSource,
    captions: &dyn CaptionSource,
    settings: &ShopSettings,
    scan_id: Uuid,
    shop: &str,
    product: &Product,
    image: &ProductImage,
) -> Result<ImageOutcome, sqlx::Error> {
    let request = CaptionRequest {
        shop: shop.to_string(),
        image_url: image.url.clone(),
        product_title: product.title.clone(),
        tags: product.tags.clone(),
        max_retries: settings.max_retries.max(1) as u32,
    };

    let caption = match captions.generate(&request).await {
        Ok(caption) => caption,
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(shop, image_id = %image.id, error = %message, "caption generation failed");
            store
                .record_image(&NewProcessedImage::failed(scan_id, product, image, &message))
                .await?;
            if settings.auto_retry && retry::is_retryable(&message) {
                store
                    .enqueue_failed(&failed_job_for(shop, product, image, &message, settings))
                    .await?;
            }
            return Ok(ImageOutcome::Failed);
        }
    };

    if caption.is_empty() {
        tracing::warn!(shop, image_id = %image.id, "provider returned an empty caption");
        store
            .record_image(&NewProcessedImage::failed(
                scan_id,
                product,
                image,
                NO_CAPTION_MESSAGE,
            ))
            .await?;
        if settings.auto_retry {
            store
                .enqueue_failed(&failed_job_for(
                    shop,
                    product,
                    image,
                    NO_CAPTION_MESSAGE,
                    settings,
                ))
                .await?;
        }
        return Ok(ImageOutcome::Failed);
    }

    match catalog
        .update_image_alt(shop, &product.id, &image.id, &caption)
        .await
    {
        Ok(user_errors) if user_errors.is_empty() => {
            store
                .record_image(&NewProcessedImage::success(scan_id, product, image, &caption))
                .await?;
            sleep(WRITE_PAUSE).await;
            Ok(ImageOutcome::Updated)
        }
        Ok(user_errors) => {
            // Platform rejection: recorded for auditability, never dead-lettered.
            let message = format!("write-back rejected: {}", join_user_errors(&user_errors));
            tracing::warn!(shop, image_id = %image.id, error = %message, "platform rejected alt-text update");
            store
                .record_image(&NewProcessedImage::failed(scan_id, product, image, &message))
                .await?;
            Ok(ImageOutcome::Failed)
        }
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(shop, image_id = %image.id, error = %message, "alt-text write-back failed");
            store
                .record_image(&NewProcessedImage::failed(scan_id, product, image, &message))
                .await?;
            if settings.auto_retry && retry::is_retryable(&message) {
                store
                    .enqueue_failed(&failed_job_for(shop, product, image, &message, settings))
                    .await?;
            }
            Ok(ImageOutcome::Failed)
        }
    }
}

fn failed_job_for(
    shop: &str,
    product: &Product,
    image: &ProductImage,
    message: &str,
    settings: &ShopSettings,
) -> NewFailedJob {
    NewFailedJob {
        shop: shop.to_string(),
        product_id: product.id.clone(),
        product_title: product.title.clone(),
        image_id: image.id.clone(),
        image_url: image.url.clone(),
        error_message: message.to_string(),
        max_retries: settings.max_retries,
    }
}

fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a dead-letter re-attempt did not stick.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RetryFailure {
    pub message: String,
}

impl RetryFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Re-attempt one dead-letter job through the same caption + write-back path
/// a scan uses. `Ok` means the image now carries the returned alt text and
/// the job can be removed; `Err` carries the message to reschedule with.
pub async fn retry_failed_job(
    catalog: &dyn CatalogSource,
    captions: &dyn CaptionSource,
    settings: &ShopSettings,
    job: &FailedJob,
) -> Result<String, RetryFailure> {
    let request = CaptionRequest {
        shop: job.shop.clone(),
        image_url: job.image_url.clone(),
        product_title: job.product_title.clone(),
        // The queue does not carry product tags; the prompt goes without them.
        tags: Vec::new(),
        max_retries: settings.max_retries.max(1) as u32,
    };

    let caption = captions
        .generate(&request)
        .await
        .map_err(|e| RetryFailure::new(e.to_string()))?;

    if caption.is_empty() {
        return Err(RetryFailure::new(NO_CAPTION_MESSAGE));
    }

    let user_errors = catalog
        .update_image_alt(&job.shop, &job.product_id, &job.image_id, &caption)
        .await
        .map_err(|e| RetryFailure::new(e.to_string()))?;

    if !user_errors.is_empty() {
        return Err(RetryFailure::new(format!(
            "write-back rejected: {}",
            join_user_errors(&user_errors)
        )));
    }

    sleep(WRITE_PAUSE).await;
    Ok(caption)
}
