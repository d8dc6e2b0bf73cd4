use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Tenant Provisioner",
            "version": version,
            "description": "Region/tenant configuration resolution and provisioning",
            "endpoints": {
                "health": "/health",
                "tenants": "/tenants/:id/configuration-detail (POST onboard, DELETE offboard)",
                "publish": "/tenants/set-tenant-properties-in-redis-by-tenant-id/:id, /tenants/set-tenant-properties-in-redis-by-region-name/:regionName (PATCH)",
                "retract": "/tenants/unset-tenant-properties-in-redis-by-tenant-id/:id (PATCH)",
                "regions": "/regions, /regions/assignable (GET), /regions (POST), /regions/:name (PUT)",
                "vault": "/vault/encrypt, /vault/password (POST)",
            }
        }
    }))
}

pub async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let registry = state.orchestrator.registry();
    let connections = json!({
        "databases": registry.databases().len().await,
        "keyValues": registry.key_values().len().await,
    });

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "connections": connections
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": true,
                "message": "database unavailable",
                "code": "SERVICE_UNAVAILABLE",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string(),
                    "connections": connections
                }
            })),
        ),
    }
}
