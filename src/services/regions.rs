// services/regions.rs - Region administration with cached listings

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::{CacheInvalidator, Invalidate, ReadCache, ASSIGNABLE_REGIONS, REGIONS};
use crate::database::models::{Region, RegionInput};
use crate::database::store::TenantStore;
use crate::services::provisioning::ProvisioningError;

const ALL: &str = "all";

pub struct RegionService {
    store: Arc<dyn TenantStore>,
    regions: ReadCache<Vec<Region>>,
    assignable: ReadCache<Vec<Region>>,
    invalidator: CacheInvalidator,
}

impl RegionService {
    /// Builds both listing caches and registers them with `invalidator`,
    /// which is then shared with the orchestrator.
    pub fn new(store: Arc<dyn TenantStore>, ttl: Duration, invalidator: &mut CacheInvalidator) -> Self {
        let regions = ReadCache::new(REGIONS, 16, ttl);
        let assignable = ReadCache::new(ASSIGNABLE_REGIONS, 16, ttl);
        invalidator.register(REGIONS, Arc::new(regions.clone()) as Arc<dyn Invalidate>);
        invalidator.register(ASSIGNABLE_REGIONS, Arc::new(assignable.clone()) as Arc<dyn Invalidate>);
        Self {
            store,
            regions,
            assignable,
            invalidator: invalidator.clone(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Region>, ProvisioningError> {
        self.regions
            .get_or_load(ALL, || async { self.store.list_regions().await.map_err(ProvisioningError::from) })
            .await
    }

    pub async fn list_assignable(&self) -> Result<Vec<Region>, ProvisioningError> {
        self.assignable
            .get_or_load(ALL, || async {
                self.store
                    .list_assignable_regions()
                    .await
                    .map_err(ProvisioningError::from)
            })
            .await
    }

    pub async fn create(&self, input: RegionInput) -> Result<Region, ProvisioningError> {
        input.validate().map_err(ProvisioningError::Validation)?;
        let region = self.store.create_region(&input).await?;
        self.invalidator.invalidate(&[REGIONS, ASSIGNABLE_REGIONS]).await;

        info!("Created region {} ({})", region.name, region.root_domain_name);
        Ok(region)
    }

    /// Updating defaults does not republish tenants; callers follow up with
    /// a region republish. Region names are fixed once created: tenants and
    /// registry targets are keyed by them.
    pub async fn update(&self, name: &str, input: RegionInput) -> Result<Region, ProvisioningError> {
        input.validate().map_err(ProvisioningError::Validation)?;
        if input.name != name {
            return Err(ProvisioningError::Validation(format!(
                "Region '{}' cannot be renamed to '{}'",
                name, input.name
            )));
        }
        let region = self.store.update_region(name, &input).await?;
        self.invalidator.invalidate(&[REGIONS, ASSIGNABLE_REGIONS]).await;

        info!("Updated region {}", region.name);
        Ok(region)
    }
}
