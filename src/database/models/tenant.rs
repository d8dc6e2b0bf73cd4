use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::types::TenantPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Owing,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Owing => "owing",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "owing" => Ok(TenantStatus::Owing),
            other => Err(format!("unknown tenant status: {}", other)),
        }
    }
}

/// Customer account. `region_name` and `region_root_domain_name` are copied
/// from the region at creation and never edited independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub sub_domain_name: String,
    pub custom_url_slug: Option<String>,
    pub region_name: String,
    pub region_root_domain_name: String,
    pub status: TenantStatus,
    pub config_detail_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn prefix(&self) -> TenantPrefix {
        TenantPrefix::from_uuid(self.id)
    }

    pub fn identity(&self) -> TenantIdentity {
        TenantIdentity {
            id: self.id,
            sub_domain_name: self.sub_domain_name.clone(),
            custom_url_slug: self.custom_url_slug.clone(),
            root_domain_name: self.region_root_domain_name.clone(),
            status: self.status,
        }
    }
}

/// The slice of a tenant the property distributor publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    pub id: Uuid,
    pub sub_domain_name: String,
    pub custom_url_slug: Option<String>,
    pub root_domain_name: String,
    pub status: TenantStatus,
}

impl TenantIdentity {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.sub_domain_name, self.root_domain_name)
    }

    /// Slug routing key, skipped when unset or blank.
    pub fn custom_slug(&self) -> Option<&str> {
        self.custom_url_slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
    }
}
