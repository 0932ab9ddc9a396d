use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db::{failed_job_queries, scan_queries};
use crate::models::failed_job::FailedJob;
use crate::routes::{api_error, internal_error, ApiError};

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub shop: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/v1/jobs — a shop's dead-letter entries, newest first.
pub async fn list_failed_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<FailedJob>>, ApiError> {
    if query.shop.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "shop is required"));
    }

    let jobs = failed_job_queries::list_for_shop(&state.db, &query.shop, query.limit.clamp(1, 200))
        .await
        .map_err(internal_error)?;
    Ok(Json(jobs))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub shop: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub shop: String,
    pub total_scans: i64,
    pub images_processed: i64,
    pub images_failed: i64,
    pub images_skipped: i64,
    /// Share of attempted images that ended in a successful write-back.
    pub success_rate: f64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub open_failed_jobs: i64,
    pub queued_scans: u64,
}

/// GET /api/v1/analytics — lifetime roll-up across a shop's scan history.
pub async fn shop_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    if query.shop.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "shop is required"));
    }

    let aggregates = scan_queries::scan_aggregates(&state.db, &query.shop)
        .await
        .map_err(internal_error)?;
    let open_failed_jobs = failed_job_queries::count_open(&state.db, &query.shop)
        .await
        .map_err(internal_error)?;
    let queued_scans = state.queue.queue_depth().await.map_err(internal_error)?;

    let attempted = aggregates.images_processed + aggregates.images_failed;
    let success_rate = if attempted > 0 {
        aggregates.images_processed as f64 / attempted as f64
    } else {
        0.0
    };

    Ok(Json(AnalyticsResponse {
        shop: query.shop,
        total_scans: aggregates.total_scans,
        images_processed: aggregates.images_processed,
        images_failed: aggregates.images_failed,
        images_skipped: aggregates.images_skipped,
        success_rate,
        last_scan_at: aggregates.last_scan_at,
        open_failed_jobs,
        queued_scans,
    }))
}
