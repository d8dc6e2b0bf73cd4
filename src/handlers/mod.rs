// handlers/mod.rs - HTTP surface
//
// Tenants: onboarding, offboarding and key-value (re)publication
// Regions: cached listings and administrative writes
// Vault:   operator helpers for sealing secrets before they are stored

pub mod health;
pub mod regions;
pub mod tenants;
pub mod vault;

use uuid::Uuid;

use crate::error::ApiError;

/// Parse a path id, keeping the JSON error envelope on failure.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid tenant id '{}'", raw)))
}
