use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::failed_job::{
    reschedule_transition, FailedJob, FailedJobStatus, NewFailedJob,
};

fn row_to_failed_job(row: &PgRow) -> Result<FailedJob, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(FailedJob {
        id: row.try_get("id")?,
        shop: row.try_get("shop")?,
        product_id: row.try_get("product_id")?,
        product_title: row.try_get("product_title")?,
        image_id: row.try_get("image_id")?,
        image_url: row.try_get("image_url")?,
        error_message: row.try_get("error_message")?,
        status: status.parse().unwrap_or(FailedJobStatus::Pending),
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        next_retry_at: row.try_get("next_retry_at")?,
        last_attempt_at: row.try_get("last_attempt_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a dead-letter entry, first eligible for retry 60 seconds from now
pub async fn enqueue(pool: &PgPool, job: &NewFailedJob) -> Result<FailedJob, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO failed_jobs (shop, product_id, product_title, image_id, image_url,
                                 error_message, max_retries, next_retry_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW() + INTERVAL '60 seconds')
        RETURNING id, shop, product_id, product_title, image_id, image_url,
                  error_message, status, retry_count, max_retries, next_retry_at,
                  last_attempt_at, created_at
        "#,
    )
    .bind(&job.shop)
    .bind(&job.product_id)
    .bind(&job.product_title)
    .bind(&job.image_id)
    .bind(&job.image_url)
    .bind(&job.error_message)
    .bind(job.max_retries)
    .fetch_one(pool)
    .await?;

    row_to_failed_job(&row)
}

/// Pending jobs whose retry time has passed, oldest-created first
pub async fn list_due(pool: &PgPool, limit: i64) -> Result<Vec<FailedJob>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, shop, product_id, product_title, image_id, image_url,
               error_message, status, retry_count, max_retries, next_retry_at,
               last_attempt_at, created_at
        FROM failed_jobs
        WHERE status = 'pending' AND next_retry_at <= NOW()
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_failed_job).collect()
}

/// A shop's dead-letter entries, newest first (for the admin view)
pub async fn list_for_shop(
    pool: &PgPool,
    shop: &str,
    limit: i64,
) -> Result<Vec<FailedJob>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, shop, product_id, product_title, image_id, image_url,
               error_message, status, retry_count, max_retries, next_retry_at,
               last_attempt_at, created_at
        FROM failed_jobs
        WHERE shop = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(shop)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_failed_job).collect()
}

/// Transition a job to `retrying`, stamping the attempt time
pub async fn mark_retrying(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE failed_jobs
        SET status = 'retrying', last_attempt_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Bump the retry count after a failed attempt. The job goes back to
/// `pending` with a new retry time `delay` from now, or to terminal
/// `failed_permanent` once the count reaches its ceiling. Errors with
/// `RowNotFound` if the job was removed in the meantime.
pub async fn reschedule(
    pool: &PgPool,
    job: &FailedJob,
    delay: Duration,
) -> Result<FailedJob, sqlx::Error> {
    let (retry_count, status) = reschedule_transition(job.retry_count, job.max_retries);
    let next_retry_at = Utc::now() + delay;

    let row = sqlx::query(
        r#"
        UPDATE failed_jobs
        SET retry_count = $1,
            status = $2,
            next_retry_at = $3,
            last_attempt_at = NOW()
        WHERE id = $4
        RETURNING id, shop, product_id, product_title, image_id, image_url,
                  error_message, status, retry_count, max_retries, next_retry_at,
                  last_attempt_at, created_at
        "#,
    )
    .bind(retry_count)
    .bind(status.to_string())
    .bind(next_retry_at)
    .bind(job.id)
    .fetch_one(pool)
    .await?;

    row_to_failed_job(&row)
}

/// Delete a job once its image has been successfully reprocessed
pub async fn remove(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM failed_jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Count of non-terminal dead-letter entries for a shop
pub async fn count_open(pool: &PgPool, shop: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS open
        FROM failed_jobs
        WHERE shop = $1 AND status != 'failed_permanent'
        "#,
    )
    .bind(shop)
    .fetch_one(pool)
    .await?;

    row.try_get("open")
}
