// handlers/regions.rs - Region endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::Json;
use std::sync::Arc;

use crate::app::AppState;
use crate::database::models::{Region, RegionInput};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /regions
pub async fn regions_get(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Vec<Region>> {
    Ok(ApiResponse::success(state.regions.list().await?))
}

/// GET /regions/assignable - regions with room for another tenant
pub async fn regions_assignable_get(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Vec<Region>> {
    Ok(ApiResponse::success(state.regions.list_assignable().await?))
}

/// POST /regions
///
/// Secrets inside the groups must already be sealed (`POST /vault/encrypt`).
pub async fn regions_post(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RegionInput>, JsonRejection>,
) -> ApiResult<Region> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.regions.create(input).await?))
}

/// PUT /regions/:name
pub async fn region_put(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<RegionInput>, JsonRejection>,
) -> ApiResult<Region> {
    let Json(input) = payload?;
    Ok(ApiResponse::success(state.regions.update(&name, input).await?))
}
