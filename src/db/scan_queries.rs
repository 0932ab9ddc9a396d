use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::scan::{
    NewProcessedImage, ProcessedImage, ProcessedImageStatus, Scan, ScanStatus, ScanTotals,
};

fn row_to_scan(row: &PgRow) -> Result<Scan, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Scan {
        id: row.try_get("id")?,
        shop: row.try_get("shop")?,
        status: status.parse().unwrap_or(ScanStatus::Running),
        force_all: row.try_get("force_all")?,
        total_products: row.try_get("total_products")?,
        total_images: row.try_get("total_images")?,
        missing_alt_text: row.try_get("missing_alt_text")?,
        images_processed: row.try_get("images_processed")?,
        images_failed: row.try_get("images_failed")?,
        images_skipped: row.try_get("images_skipped")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn row_to_processed_image(row: &PgRow) -> Result<ProcessedImage, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ProcessedImage {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        product_id: row.try_get("product_id")?,
        product_title: row.try_get("product_title")?,
        image_id: row.try_get("image_id")?,
        image_url: row.try_get("image_url")?,
        previous_alt_text: row.try_get("previous_alt_text")?,
        new_alt_text: row.try_get("new_alt_text")?,
        status: status.parse().unwrap_or(ProcessedImageStatus::Failed),
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a new scan in `running` state
pub async fn create_scan(pool: &PgPool, shop: &str, force_all: bool) -> Result<Scan, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO scans (shop, force_all)
        VALUES ($1, $2)
        RETURNING id, shop, status, force_all, total_products, total_images,
                  missing_alt_text, images_processed, images_failed, images_skipped,
                  started_at, completed_at
        "#,
    )
    .bind(shop)
    .bind(force_all)
    .fetch_one(pool)
    .await?;

    row_to_scan(&row)
}

/// Write final aggregates and the terminal status, stamping completion time
pub async fn finalize_scan(
    pool: &PgPool,
    scan_id: Uuid,
    totals: &ScanTotals,
    status: ScanStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE scans
        SET status = $1,
            total_products = $2,
            total_images = $3,
            missing_alt_text = $4,
            images_processed = $5,
            images_failed = $6,
            images_skipped = $7,
            completed_at = NOW()
        WHERE id = $8
        "#,
    )
    .bind(status.to_string())
    .bind(totals.total_products)
    .bind(totals.total_images)
    .bind(totals.missing_alt_text)
    .bind(totals.images_processed)
    .bind(totals.images_failed)
    .bind(totals.images_skipped)
    .bind(scan_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a still-running scan newer than `cutoff` (for the overlap guard)
pub async fn find_active_scan(
    pool: &PgPool,
    shop: &str,
    cutoff: DateTime<Utc>,
) -> Result<Option<Scan>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, shop, status, force_all, total_products, total_images,
               missing_alt_text, images_processed, images_failed, images_skipped,
               started_at, completed_at
        FROM scans
        WHERE shop = $1 AND status = 'running' AND started_at > $2
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(shop)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_scan).transpose()
}

/// Scan history for a shop, newest first
pub async fn list_scans(pool: &PgPool, shop: &str, limit: i64) -> Result<Vec<Scan>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, shop, status, force_all, total_products, total_images,
               missing_alt_text, images_processed, images_failed, images_skipped,
               started_at, completed_at
        FROM scans
        WHERE shop = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(shop)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_scan).collect()
}

/// Get a scan by ID
pub async fn get_scan(pool: &PgPool, scan_id: Uuid) -> Result<Option<Scan>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, shop, status, force_all, total_products, total_images,
               missing_alt_text, images_processed, images_failed, images_skipped,
               started_at, completed_at
        FROM scans
        WHERE id = $1
        "#,
    )
    .bind(scan_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_scan).transpose()
}

/// Insert one per-image outcome row
pub async fn record_image(
    pool: &PgPool,
    record: &NewProcessedImage,
) -> Result<ProcessedImage, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO processed_images (scan_id, product_id, product_title, image_id,
                                      image_url, previous_alt_text, new_alt_text,
                                      status, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, scan_id, product_id, product_title, image_id, image_url,
                  previous_alt_text, new_alt_text, status, error_message, created_at
        "#,
    )
    .bind(record.scan_id)
    .bind(&record.product_id)
    .bind(&record.product_title)
    .bind(&record.image_id)
    .bind(&record.image_url)
    .bind(&record.previous_alt_text)
    .bind(&record.new_alt_text)
    .bind(record.status.to_string())
    .bind(&record.error_message)
    .fetch_one(pool)
    .await?;

    row_to_processed_image(&row)
}

/// Outcome records for one scan, oldest first
pub async fn list_processed_images(
    pool: &PgPool,
    scan_id: Uuid,
) -> Result<Vec<ProcessedImage>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, scan_id, product_id, product_title, image_id, image_url,
               previous_alt_text, new_alt_text, status, error_message, created_at
        FROM processed_images
        WHERE scan_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(scan_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_processed_image).collect()
}

/// Lifetime aggregates across a shop's scan history.
#[derive(Debug, Clone, Serialize)]
pub struct ScanAggregates {
    pub total_scans: i64,
    pub images_processed: i64,
    pub images_failed: i64,
    pub images_skipped: i64,
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// Roll up scan history for the analytics view
pub async fn scan_aggregates(pool: &PgPool, shop: &str) -> Result<ScanAggregates, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_scans,
               COALESCE(SUM(images_processed), 0)::BIGINT AS images_processed,
               COALESCE(SUM(images_failed), 0)::BIGINT AS images_failed,
               COALESCE(SUM(images_skipped), 0)::BIGINT AS images_skipped,
               MAX(started_at) AS last_scan_at
        FROM scans
        WHERE shop = $1
        "#,
    )
    .bind(shop)
    .fetch_one(pool)
    .await?;

    Ok(ScanAggregates {
        total_scans: row.try_get("total_scans")?,
        images_processed: row.try_get("images_processed")?,
        images_failed: row.try_get("images_failed")?,
        images_skipped: row.try_get("images_skipped")?,
        last_scan_at: row.try_get("last_scan_at")?,
    })
}
