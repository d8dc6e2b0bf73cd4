// resolver/mod.rs - ConfigResolver
// Tenant override first, region default second, one group at a time

use crate::database::models::{Region, RegionDefaults, ResolvedConfig, TenantOverrides};

/// Merge a region's defaults with a tenant's overrides.
///
/// Every group is taken whole from the override when present. A partially
/// filled override group is used exactly as given and never patched with
/// fields from the region default.
pub fn resolve(region: &Region, overrides: &TenantOverrides) -> ResolvedConfig {
    resolve_defaults(&region.defaults, overrides)
}

pub fn resolve_defaults(defaults: &RegionDefaults, overrides: &TenantOverrides) -> ResolvedConfig {
    fn pick<T: Clone>(tenant: &Option<T>, region: &T) -> T {
        tenant.as_ref().unwrap_or(region).clone()
    }

    ResolvedConfig {
        db_properties: pick(&overrides.db_properties, &defaults.db_properties),
        redis_properties: pick(&overrides.redis_properties, &defaults.redis_properties),
        search_properties: pick(&overrides.search_properties, &defaults.search_properties),
        smtp_properties: pick(&overrides.smtp_properties, &defaults.smtp_properties),
        jwt_properties: pick(&overrides.jwt_properties, &defaults.jwt_properties),
        auth_providers: pick(&overrides.auth_providers, &defaults.auth_providers),
        file_system: pick(&overrides.file_system, &defaults.file_system),
        size_limits: pick(&overrides.size_limits, &defaults.size_limits),
        theme: pick(&overrides.theme, &defaults.theme),
    }
}
