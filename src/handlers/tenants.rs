// handlers/tenants.rs - Tenant provisioning endpoints

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use std::sync::Arc;

use crate::app::AppState;
use crate::database::models::TenantOverrides;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::provisioning::{OffboardingReport, OnboardingReport, PublishReport, RepublishReport};

use super::parse_id;

/// POST /tenants/:id/configuration-detail - onboard a tenant
///
/// Body: the tenant's overrides, each group optional (`{}` or an empty body
/// inherits every region default):
/// ```json
/// { "dbProperties": { ... }, "redisProperties": { ... }, "theme": { ... } }
/// ```
pub async fn configuration_detail_post(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<OnboardingReport> {
    let tenant_id = parse_id(&id)?;
    let overrides: TenantOverrides = if body.iter().all(u8::is_ascii_whitespace) {
        TenantOverrides::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid_json(e.to_string()))?
    };

    let report = state.orchestrator.onboard(tenant_id, overrides).await?;
    Ok(ApiResponse::created(report))
}

/// DELETE /tenants/:id/configuration-detail - retract and unlink
pub async fn configuration_detail_delete(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<OffboardingReport> {
    let tenant_id = parse_id(&id)?;
    Ok(ApiResponse::success(state.orchestrator.offboard(tenant_id).await?))
}

/// PATCH /tenants/set-tenant-properties-in-redis-by-region-name/:regionName
pub async fn set_properties_by_region_name(
    Extension(state): Extension<Arc<AppState>>,
    Path(region_name): Path<String>,
) -> ApiResult<RepublishReport> {
    let report = state
        .orchestrator
        .set_tenant_properties_by_region_name(&region_name)
        .await?;
    Ok(ApiResponse::success(report))
}

/// PATCH /tenants/set-tenant-properties-in-redis-by-tenant-id/:id
pub async fn set_properties_by_tenant_id(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PublishReport> {
    let tenant_id = parse_id(&id)?;
    let report = state
        .orchestrator
        .set_tenant_properties_by_tenant_id(tenant_id)
        .await?;
    Ok(ApiResponse::success(report))
}

/// PATCH /tenants/unset-tenant-properties-in-redis-by-tenant-id/:id
pub async fn unset_properties_by_tenant_id(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PublishReport> {
    let tenant_id = parse_id(&id)?;
    let report = state
        .orchestrator
        .unset_tenant_properties_by_tenant_id(tenant_id)
        .await?;
    Ok(ApiResponse::success(report))
}
