use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::scan_queries;
use crate::models::scan::{ProcessedImage, Scan};
use crate::routes::{api_error, internal_error, ApiError};
use crate::services::queue::QueuedScan;

/// Window within which an unfinished scan blocks a new one. A crashed scan
/// stays `running` forever, so the guard has to age out.
const ACTIVE_SCAN_WINDOW_HOURS: i64 = 24;

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartScanRequest {
    #[garde(length(min = 1, max = 255))]
    pub shop: String,

    #[serde(default)]
    #[garde(skip)]
    pub force_all: bool,
}

#[derive(Debug, Serialize)]
pub struct StartScanResponse {
    pub status: String,
    pub shop: String,
    pub force_all: bool,
}

/// POST /api/v1/scans — queue a catalog scan for the worker.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<StartScanResponse>), ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let cutoff = Utc::now() - Duration::hours(ACTIVE_SCAN_WINDOW_HOURS);
    if let Some(active) = scan_queries::find_active_scan(&state.db, &request.shop, cutoff)
        .await
        .map_err(internal_error)?
    {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("a scan started at {} is still running", active.started_at),
        ));
    }

    state
        .queue
        .enqueue(&QueuedScan {
            shop: request.shop.clone(),
            force_all: request.force_all,
        })
        .await
        .map_err(internal_error)?;

    tracing::info!(shop = %request.shop, force_all = request.force_all, "scan queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartScanResponse {
            status: "queued".to_string(),
            shop: request.shop,
            force_all: request.force_all,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ScanListQuery {
    pub shop: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/v1/scans — scan history for a shop, newest first.
pub async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<ScanListQuery>,
) -> Result<Json<Vec<Scan>>, ApiError> {
    if query.shop.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "shop is required"));
    }

    let scans = scan_queries::list_scans(&state.db, &query.shop, query.limit.clamp(1, 100))
        .await
        .map_err(internal_error)?;
    Ok(Json(scans))
}

#[derive(Debug, Serialize)]
pub struct ScanDetailResponse {
    #[serde(flatten)]
    pub scan: Scan,
    pub images: Vec<ProcessedImage>,
}

/// GET /api/v1/scans/{scan_id} — one scan together with its outcome records.
pub async fn get_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Json<ScanDetailResponse>, ApiError> {
    let scan = scan_queries::get_scan(&state.db, scan_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "scan not found"))?;

    let images = scan_queries::list_processed_images(&state.db, scan_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(ScanDetailResponse { scan, images }))
}
