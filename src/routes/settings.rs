use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::settings_queries;
use crate::models::settings::{SettingsUpdate, ShopSettings};
use crate::routes::{api_error, internal_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    pub shop: String,
}

/// GET /api/v1/settings — a shop's settings, created with defaults on first
/// read.
pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Json<ShopSettings>, ApiError> {
    if query.shop.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "shop is required"));
    }

    let settings = settings_queries::get_or_create(&state.db, &query.shop)
        .await
        .map_err(internal_error)?;
    Ok(Json(settings))
}

/// PUT /api/v1/settings — replace a shop's settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<ShopSettings>, ApiError> {
    update
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let settings = settings_queries::upsert(&state.db, &update)
        .await
        .map_err(internal_error)?;

    tracing::info!(shop = %settings.shop, "settings updated");
    Ok(Json(settings))
}
