use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::groups::TenantOverrides;
use crate::types::TenantPrefix;

/// Per-tenant override record. References its tenant and region by id only.
///
/// `tenant_id` becomes `None` once the tenant is offboarded; the row itself is
/// kept. `db_schema` is written at creation and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigDetail {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub region_id: Uuid,
    pub db_schema: TenantPrefix,
    #[serde(flatten)]
    pub overrides: TenantOverrides,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the onboarding transaction.
#[derive(Debug, Clone)]
pub struct NewTenantConfigDetail {
    pub tenant_id: Uuid,
    pub region_id: Uuid,
    pub db_schema: TenantPrefix,
    pub overrides: TenantOverrides,
}
