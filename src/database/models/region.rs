use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::groups::RegionDefaults;

/// Deployment unit owning the default infrastructure credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: Uuid,
    pub name: String,
    pub root_domain_name: String,
    /// Maximum number of tenants the region accepts
    pub capacity: i32,
    #[serde(flatten)]
    pub defaults: RegionDefaults,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Administrative create/update payload. Secrets arrive already sealed
/// (see `POST /vault/encrypt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionInput {
    pub name: String,
    pub root_domain_name: String,
    pub capacity: i32,
    #[serde(flatten)]
    pub defaults: RegionDefaults,
}

impl RegionInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Region name is required".to_string());
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Region name can only contain letters, numbers, hyphens, and underscores".to_string());
        }
        if self.root_domain_name.trim().is_empty() {
            return Err("Region root domain name is required".to_string());
        }
        if self.capacity < 0 {
            return Err("Region capacity cannot be negative".to_string());
        }
        Ok(())
    }
}
