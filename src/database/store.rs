// database/store.rs - Region / Tenant / TenantConfigDetail persistence
// Plain reads and the one transactional write the onboarding flow needs

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::models::*;
use crate::types::TenantPrefix;

/// Relational collaborator used by the orchestrator and the region service.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn list_regions(&self) -> Result<Vec<Region>, DatabaseError>;

    /// Regions whose linked tenant count is below their capacity.
    async fn list_assignable_regions(&self) -> Result<Vec<Region>, DatabaseError>;

    async fn find_region(&self, id: Uuid) -> Result<Option<Region>, DatabaseError>;

    async fn find_region_by_name(&self, name: &str) -> Result<Option<Region>, DatabaseError>;

    async fn create_region(&self, input: &RegionInput) -> Result<Region, DatabaseError>;

    /// Update by name; `input.name` is ignored since names never change.
    /// Also refreshes the denormalized root domain on the region's tenants.
    async fn update_region(&self, name: &str, input: &RegionInput) -> Result<Region, DatabaseError>;

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError>;

    /// Tenants of a region that currently have a configuration detail linked.
    async fn list_linked_tenants(&self, region_name: &str) -> Result<Vec<Tenant>, DatabaseError>;

    async fn find_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError>;

    /// Insert the detail and link it to its tenant in one transaction.
    async fn create_config_detail(&self, new: NewTenantConfigDetail) -> Result<TenantConfigDetail, DatabaseError>;

    /// Detach the detail from its tenant without deleting it. Returns the
    /// detail as it was before unlinking.
    async fn unlink_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError>;
}

const REGION_COLUMNS: &str = "id, name, root_domain_name, capacity, db_properties, redis_properties, \
    search_properties, smtp_properties, jwt_properties, auth_providers, file_system, size_limits, theme, \
    created_at, updated_at";

const TENANT_COLUMNS: &str = "id, sub_domain_name, custom_url_slug, region_name, region_root_domain_name, \
    status, config_detail_id, created_at, updated_at";

const DETAIL_COLUMNS: &str = "id, tenant_id, region_id, db_schema, db_properties, redis_properties, \
    search_properties, smtp_properties, jwt_properties, auth_providers, file_system, size_limits, theme, \
    created_at, updated_at";

/// `TenantStore` over the main Postgres database.
#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn group<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, DatabaseError> {
    let value: Json<T> = row.try_get(column)?;
    Ok(value.0)
}

fn optional_group<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<Option<T>, DatabaseError> {
    let value: Option<Json<T>> = row.try_get(column)?;
    Ok(value.map(|json| json.0))
}

fn region_from_row(row: &PgRow) -> Result<Region, DatabaseError> {
    Ok(Region {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        root_domain_name: row.try_get("root_domain_name")?,
        capacity: row.try_get("capacity")?,
        defaults: RegionDefaults {
            db_properties: group(row, "db_properties")?,
            redis_properties: group(row, "redis_properties")?,
            search_properties: group(row, "search_properties")?,
            smtp_properties: group(row, "smtp_properties")?,
            jwt_properties: group(row, "jwt_properties")?,
            auth_providers: group(row, "auth_providers")?,
            file_system: group(row, "file_system")?,
            size_limits: group(row, "size_limits")?,
            theme: group(row, "theme")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, DatabaseError> {
    let status: String = row.try_get("status")?;
    Ok(Tenant {
        id: row.try_get("id")?,
        sub_domain_name: row.try_get("sub_domain_name")?,
        custom_url_slug: row.try_get("custom_url_slug")?,
        region_name: row.try_get("region_name")?,
        region_root_domain_name: row.try_get("region_root_domain_name")?,
        status: status.parse().map_err(DatabaseError::Corrupt)?,
        config_detail_id: row.try_get("config_detail_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn detail_from_row(row: &PgRow) -> Result<TenantConfigDetail, DatabaseError> {
    let db_schema: String = row.try_get("db_schema")?;
    Ok(TenantConfigDetail {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        region_id: row.try_get("region_id")?,
        db_schema: TenantPrefix::try_from(db_schema).map_err(DatabaseError::Corrupt)?,
        overrides: TenantOverrides {
            db_properties: optional_group(row, "db_properties")?,
            redis_properties: optional_group(row, "redis_properties")?,
            search_properties: optional_group(row, "search_properties")?,
            smtp_properties: optional_group(row, "smtp_properties")?,
            jwt_properties: optional_group(row, "jwt_properties")?,
            auth_providers: optional_group(row, "auth_providers")?,
            file_system: optional_group(row, "file_system")?,
            size_limits: optional_group(row, "size_limits")?,
            theme: optional_group(row, "theme")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        crate::database::pg::health_check(&self.pool).await
    }

    async fn list_regions(&self) -> Result<Vec<Region>, DatabaseError> {
        let rows = sqlx::query(&format!("SELECT {} FROM regions ORDER BY name", REGION_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(region_from_row).collect()
    }

    async fn list_assignable_regions(&self) -> Result<Vec<Region>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM regions r
            WHERE r.capacity > (
                SELECT COUNT(*) FROM tenant_config_details d
                WHERE d.region_id = r.id AND d.tenant_id IS NOT NULL
            )
            ORDER BY r.name
            "#,
            REGION_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(region_from_row).collect()
    }

    async fn find_region(&self, id: Uuid) -> Result<Option<Region>, DatabaseError> {
        let row = sqlx::query(&format!("SELECT {} FROM regions WHERE id = $1", REGION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(region_from_row).transpose()
    }

    async fn find_region_by_name(&self, name: &str) -> Result<Option<Region>, DatabaseError> {
        let row = sqlx::query(&format!("SELECT {} FROM regions WHERE name = $1", REGION_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(region_from_row).transpose()
    }

    async fn create_region(&self, input: &RegionInput) -> Result<Region, DatabaseError> {
        let d = &input.defaults;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO regions (id, name, root_domain_name, capacity, db_properties, redis_properties,
                search_properties, smtp_properties, jwt_properties, auth_providers, file_system,
                size_limits, theme)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            REGION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.root_domain_name)
        .bind(input.capacity)
        .bind(Json(&d.db_properties))
        .bind(Json(&d.redis_properties))
        .bind(Json(&d.search_properties))
        .bind(Json(&d.smtp_properties))
        .bind(Json(&d.jwt_properties))
        .bind(Json(&d.auth_providers))
        .bind(Json(&d.file_system))
        .bind(Json(&d.size_limits))
        .bind(Json(&d.theme))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, format!("region '{}' already exists", input.name)))?;

        info!("Created region {}", input.name);
        region_from_row(&row)
    }

    async fn update_region(&self, name: &str, input: &RegionInput) -> Result<Region, DatabaseError> {
        let d = &input.defaults;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE regions SET
                root_domain_name = $2, capacity = $3, db_properties = $4, redis_properties = $5,
                search_properties = $6, smtp_properties = $7, jwt_properties = $8,
                auth_providers = $9, file_system = $10, size_limits = $11, theme = $12,
                updated_at = now()
            WHERE name = $1
            RETURNING {}
            "#,
            REGION_COLUMNS
        ))
        .bind(name)
        .bind(&input.root_domain_name)
        .bind(input.capacity)
        .bind(Json(&d.db_properties))
        .bind(Json(&d.redis_properties))
        .bind(Json(&d.search_properties))
        .bind(Json(&d.smtp_properties))
        .bind(Json(&d.jwt_properties))
        .bind(Json(&d.auth_providers))
        .bind(Json(&d.file_system))
        .bind(Json(&d.size_limits))
        .bind(Json(&d.theme))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("region '{}'", name)))?;

        sqlx::query(
            "UPDATE tenants SET region_root_domain_name = $2, updated_at = now() \
             WHERE region_name = $1 AND region_root_domain_name <> $2",
        )
        .bind(name)
        .bind(&input.root_domain_name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Updated region {}", name);
        region_from_row(&row)
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError> {
        let row = sqlx::query(&format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn list_linked_tenants(&self, region_name: &str) -> Result<Vec<Tenant>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tenants WHERE region_name = $1 AND config_detail_id IS NOT NULL ORDER BY created_at",
            TENANT_COLUMNS
        ))
        .bind(region_name)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(tenant_from_row).collect()
    }

    async fn find_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tenant_config_details WHERE tenant_id = $1",
            DETAIL_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(detail_from_row).transpose()
    }

    async fn create_config_detail(&self, new: NewTenantConfigDetail) -> Result<TenantConfigDetail, DatabaseError> {
        let o = &new.overrides;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tenant_config_details (id, tenant_id, region_id, db_schema, db_properties,
                redis_properties, search_properties, smtp_properties, jwt_properties, auth_providers,
                file_system, size_limits, theme)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            DETAIL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.tenant_id)
        .bind(new.region_id)
        .bind(new.db_schema.as_str())
        .bind(o.db_properties.as_ref().map(Json))
        .bind(o.redis_properties.as_ref().map(Json))
        .bind(o.search_properties.as_ref().map(Json))
        .bind(o.smtp_properties.as_ref().map(Json))
        .bind(o.jwt_properties.as_ref().map(Json))
        .bind(o.auth_providers.as_ref().map(Json))
        .bind(o.file_system.as_ref().map(Json))
        .bind(o.size_limits.as_ref().map(Json))
        .bind(o.theme.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            DatabaseError::from_write(e, format!("schema {} is already provisioned", new.db_schema))
        })?;
        let detail = detail_from_row(&row)?;

        let linked = sqlx::query(
            "UPDATE tenants SET config_detail_id = $1, updated_at = now() \
             WHERE id = $2 AND config_detail_id IS NULL",
        )
        .bind(detail.id)
        .bind(new.tenant_id)
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            // Dropping the transaction rolls the insert back
            return Err(DatabaseError::Duplicate(format!(
                "tenant {} already has a configuration detail",
                new.tenant_id
            )));
        }

        tx.commit().await?;
        info!("Created configuration detail {} for tenant {}", detail.id, new.tenant_id);
        Ok(detail)
    }

    async fn unlink_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM tenant_config_details WHERE tenant_id = $1 FOR UPDATE",
            DETAIL_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let detail = detail_from_row(&row)?;

        sqlx::query("UPDATE tenants SET config_detail_id = NULL, updated_at = now() WHERE id = $1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE tenant_config_details SET tenant_id = NULL, updated_at = now() WHERE id = $1")
            .bind(detail.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Unlinked configuration detail {} from tenant {}", detail.id, tenant_id);
        Ok(Some(detail))
    }
}
