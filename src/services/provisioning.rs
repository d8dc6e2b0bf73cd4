// services/provisioning.rs - ProvisioningOrchestrator
// Sequences tenant onboarding and offboarding across the relational store,
// the region database, tenant storage and the runtime key-value store.
//
// Only the config-detail insert + tenant link is transactional. Everything
// after it runs outside that transaction; on failure the key-value snapshot
// is retracted best-effort while schema and directories stay in place for
// manual remediation.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::{CacheInvalidator, ASSIGNABLE_REGIONS};
use crate::database::error::DatabaseError;
use crate::database::models::{
    NewTenantConfigDetail, Region, ResolvedConfig, Tenant, TenantConfigDetail, TenantIdentity, TenantOverrides,
};
use crate::database::registry::{target_name, ConnectionError, ConnectionRegistry, DbHandle};
use crate::database::schema::create_schema;
use crate::database::store::TenantStore;
use crate::distributor::{BootstrapAdmin, PropertyDistributor};
use crate::kv::{KvError, KvHandle};
use crate::resolver::resolve;
use crate::services::mailer::{EmailMessage, Mailer};
use crate::storage::{DirectoryError, DirectoryProvisioner};
use crate::types::TenantPrefix;
use crate::vault::{CredentialVault, VaultError};

/// Onboarding progress. Terminal success is `Notified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStage {
    Created,
    Resolved,
    ResourcesProvisioned,
    Published,
    Notified,
    RollingBack,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningStage::Created => "created",
            ProvisioningStage::Resolved => "resolved",
            ProvisioningStage::ResourcesProvisioned => "resources_provisioned",
            ProvisioningStage::Published => "published",
            ProvisioningStage::Notified => "notified",
            ProvisioningStage::RollingBack => "rolling_back",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("schema creation failed: {0}")]
    Schema(#[source] DatabaseError),

    #[error("storage provisioning failed: {0}")]
    Directory(#[source] DirectoryError),

    #[error("key-value publish failed: {0}")]
    Publish(#[source] KvError),

    #[error("step '{step}' timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Data-integrity failure, e.g. a tenant pointing at a missing region.
    #[error("Configuration could not be resolved: {0}")]
    Resolution(String),

    #[error("Provisioning failed while {stage}: {source}")]
    Resource {
        stage: ProvisioningStage,
        #[source]
        source: ResourceError,
    },

    #[error("Secret could not be decrypted: {0}")]
    Decryption(#[from] VaultError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Store error: {0}")]
    Store(#[source] DatabaseError),
}

impl From<DatabaseError> for ProvisioningError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Duplicate(what) => ProvisioningError::Conflict(format!("{} already exists", what)),
            DatabaseError::NotFound(what) => ProvisioningError::NotFound(format!("{} not found", what)),
            other => ProvisioningError::Store(other),
        }
    }
}

fn resource(stage: ProvisioningStage, source: ResourceError) -> ProvisioningError {
    ProvisioningError::Resource { stage, source }
}

#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    /// Upper bound for every single database, key-value or mail call
    pub step_timeout: Duration,
    /// Local part of the bootstrap admin address, domain is the tenant FQDN
    pub admin_email_user: String,
    pub admin_first_name: String,
    pub admin_last_name: String,
    pub notification_sender: String,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(10),
            admin_email_user: "admin".to_string(),
            admin_first_name: "Super".to_string(),
            admin_last_name: "Admin".to_string(),
            notification_sender: "noreply@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingReport {
    pub tenant_id: Uuid,
    pub prefix: TenantPrefix,
    pub region_name: String,
    pub fqdn: String,
    pub stage: ProvisioningStage,
    pub config_detail_id: Uuid,
    pub storage_root: PathBuf,
    pub published_keys: usize,
    pub admin_email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffboardingReport {
    pub tenant_id: Uuid,
    pub prefix: TenantPrefix,
    pub retracted_keys: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub tenant_id: Uuid,
    pub prefix: TenantPrefix,
    pub keys: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepublishFailure {
    pub tenant_id: Uuid,
    pub error: String,
}

/// Outcome of re-publishing a whole region. Failures are collected per
/// tenant rather than stopping the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepublishReport {
    pub region_name: String,
    pub published: Vec<PublishReport>,
    pub failed: Vec<RepublishFailure>,
}

impl RepublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything needed to address a provisioned tenant's resources.
struct TenantContext {
    tenant: Tenant,
    region: Region,
    detail: TenantConfigDetail,
    resolved: ResolvedConfig,
}

impl TenantContext {
    fn prefix(&self) -> &TenantPrefix {
        &self.detail.db_schema
    }

    fn identity(&self) -> TenantIdentity {
        TenantIdentity {
            root_domain_name: self.region.root_domain_name.clone(),
            ..self.tenant.identity()
        }
    }
}

pub struct ProvisioningOrchestrator {
    store: Arc<dyn TenantStore>,
    registry: Arc<ConnectionRegistry>,
    vault: Arc<CredentialVault>,
    directories: DirectoryProvisioner,
    mailer: Arc<dyn Mailer>,
    caches: CacheInvalidator,
    settings: ProvisioningSettings,
}

impl ProvisioningOrchestrator {
    pub fn new(
        store: Arc<dyn TenantStore>,
        registry: Arc<ConnectionRegistry>,
        vault: Arc<CredentialVault>,
        directories: DirectoryProvisioner,
        mailer: Arc<dyn Mailer>,
        caches: CacheInvalidator,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            store,
            registry,
            vault,
            directories,
            mailer,
            caches,
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Bound `fut` by the step timeout. A timeout fails the step.
    async fn timed<T, F>(&self, stage: ProvisioningStage, step: &'static str, fut: F) -> Result<T, ProvisioningError>
    where
        F: Future<Output = Result<T, ProvisioningError>>,
    {
        let after = self.settings.step_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => Err(resource(stage, ResourceError::Timeout { step, after })),
        }
    }

    fn advance(&self, tenant_id: Uuid, stage: &mut ProvisioningStage, next: ProvisioningStage) {
        *stage = next;
        info!("Tenant {} provisioning stage: {}", tenant_id, next);
    }

    /// Provision a tenant: persist and link its overrides, create its
    /// resources, publish its properties and notify its first admin.
    pub async fn onboard(&self, tenant_id: Uuid, overrides: TenantOverrides) -> Result<OnboardingReport, ProvisioningError> {
        validate_overrides(&overrides)?;

        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("Tenant '{}' not found", tenant_id)))?;
        if tenant.config_detail_id.is_some() {
            return Err(ProvisioningError::Conflict(format!(
                "Tenant '{}' is already provisioned",
                tenant_id
            )));
        }
        let region = self
            .store
            .find_region_by_name(&tenant.region_name)
            .await?
            .ok_or_else(|| {
                ProvisioningError::Resolution(format!(
                    "Tenant '{}' references missing region '{}'",
                    tenant_id, tenant.region_name
                ))
            })?;

        let prefix = TenantPrefix::from_uuid(tenant.id);
        let detail = self
            .timed(ProvisioningStage::Created, "create configuration detail", async {
                self.store
                    .create_config_detail(NewTenantConfigDetail {
                        tenant_id: tenant.id,
                        region_id: region.id,
                        db_schema: prefix.clone(),
                        overrides,
                    })
                    .await
                    .map_err(ProvisioningError::from)
            })
            .await?;

        let mut stage = ProvisioningStage::Created;
        info!("Tenant {} provisioning stage: {} ({})", tenant_id, stage, prefix);
        self.caches.invalidate(&[ASSIGNABLE_REGIONS]).await;

        let resolved = resolve(&region, &detail.overrides);
        let ctx = TenantContext {
            tenant,
            region,
            detail,
            resolved,
        };
        self.advance(tenant_id, &mut stage, ProvisioningStage::Resolved);

        let mut kv_handle: Option<KvHandle> = None;
        match self.provision(&ctx, &mut stage, &mut kv_handle).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let failed_at = stage;
                self.advance(tenant_id, &mut stage, ProvisioningStage::RollingBack);
                error!(
                    "Onboarding of tenant {} ({}) failed after {}: {}. Configuration detail {} stays linked; \
                     schema and storage under {} may need manual remediation",
                    tenant_id,
                    ctx.prefix(),
                    failed_at,
                    err,
                    ctx.detail.id,
                    ctx.prefix()
                );
                self.roll_back(&ctx, kv_handle.as_ref()).await;
                Err(err)
            }
        }
    }

    async fn provision(
        &self,
        ctx: &TenantContext,
        stage: &mut ProvisioningStage,
        kv_slot: &mut Option<KvHandle>,
    ) -> Result<OnboardingReport, ProvisioningError> {
        let prefix = ctx.prefix();
        let identity = ctx.identity();

        let (db, kv) = tokio::try_join!(
            self.timed(*stage, "connect database", self.database_for(ctx)),
            self.timed(*stage, "connect key-value store", self.key_value_for(ctx)),
        )?;
        *kv_slot = Some(kv.clone());

        self.create_tenant_schema(&db, prefix, *stage).await?;
        let storage_root = self
            .directories
            .materialize(Path::new(&ctx.resolved.file_system.path), prefix)
            .await
            .map_err(|e| resource(*stage, ResourceError::Directory(e)))?;
        self.advance(ctx.tenant.id, stage, ProvisioningStage::ResourcesProvisioned);

        let password = self.vault.generate_password();
        let admin = BootstrapAdmin {
            email: format!("{}@{}", self.settings.admin_email_user, identity.fqdn()),
            first_name: self.settings.admin_first_name.clone(),
            last_name: self.settings.admin_last_name.clone(),
            password: self.vault.encrypt(&password)?,
        };

        let current = *stage;
        let snapshot = self
            .timed(current, "publish properties", async {
                let snapshot = PropertyDistributor::publish(kv.as_ref(), prefix, &ctx.resolved, &identity)
                    .await
                    .map_err(|e| resource(current, ResourceError::Publish(e)))?;
                PropertyDistributor::publish_bootstrap(kv.as_ref(), prefix, &admin)
                    .await
                    .map_err(|e| resource(current, ResourceError::Publish(e)))?;
                Ok(snapshot)
            })
            .await?;
        self.advance(ctx.tenant.id, stage, ProvisioningStage::Published);

        self.notify(&identity, &admin, &password).await;
        self.advance(ctx.tenant.id, stage, ProvisioningStage::Notified);

        Ok(OnboardingReport {
            tenant_id: ctx.tenant.id,
            prefix: prefix.clone(),
            region_name: ctx.region.name.clone(),
            fqdn: identity.fqdn(),
            stage: *stage,
            config_detail_id: ctx.detail.id,
            storage_root,
            published_keys: snapshot.len(),
            admin_email: admin.email,
        })
    }

    async fn create_tenant_schema(
        &self,
        db: &DbHandle,
        prefix: &TenantPrefix,
        stage: ProvisioningStage,
    ) -> Result<(), ProvisioningError> {
        self.timed(stage, "create schema", async {
            create_schema(db.as_ref(), prefix)
                .await
                .map_err(|e| resource(stage, ResourceError::Schema(e)))
        })
        .await
    }

    /// Fire-and-forget: a failed notification is logged, never fatal.
    async fn notify(&self, identity: &TenantIdentity, admin: &BootstrapAdmin, password: &str) {
        let message = EmailMessage {
            to: admin.email.clone(),
            from: self.settings.notification_sender.clone(),
            subject: format!("Your workspace {} is ready", identity.fqdn()),
            text: format!(
                "Hello {} {},\n\nYour workspace is available at https://{}\n\nLogin: {}\nTemporary password: {}\n",
                admin.first_name,
                admin.last_name,
                identity.fqdn(),
                admin.email,
                password
            ),
        };
        match tokio::time::timeout(self.settings.step_timeout, self.mailer.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Welcome mail for {} not sent: {}", identity.fqdn(), e),
            Err(_) => warn!("Welcome mail for {} timed out", identity.fqdn()),
        }
    }

    /// Best-effort compensation. Errors are logged; the caller reports the
    /// original failure.
    async fn roll_back(&self, ctx: &TenantContext, kv: Option<&KvHandle>) {
        let Some(kv) = kv else {
            warn!("No key-value handle for {}; nothing to retract", ctx.prefix());
            return;
        };
        let identity = ctx.identity();
        let after = self.settings.step_timeout;

        match tokio::time::timeout(after, PropertyDistributor::retract(kv.as_ref(), ctx.prefix(), &identity)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Rollback retract for {} failed: {}", ctx.prefix(), e),
            Err(_) => error!("Rollback retract for {} timed out", ctx.prefix()),
        }
        match tokio::time::timeout(after, PropertyDistributor::retract_bootstrap(kv.as_ref(), ctx.prefix())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Rollback bootstrap retract for {} failed: {}", ctx.prefix(), e),
            Err(_) => error!("Rollback bootstrap retract for {} timed out", ctx.prefix()),
        }
    }

    async fn database_for(&self, ctx: &TenantContext) -> Result<DbHandle, ProvisioningError> {
        let name = target_name(
            &ctx.region.name,
            ctx.prefix(),
            ctx.detail.overrides.db_properties.is_some(),
        );
        Ok(self.registry.database(&name, &ctx.resolved.db_properties).await?)
    }

    async fn key_value_for(&self, ctx: &TenantContext) -> Result<KvHandle, ProvisioningError> {
        let name = target_name(
            &ctx.region.name,
            ctx.prefix(),
            ctx.detail.overrides.redis_properties.is_some(),
        );
        Ok(self.registry.key_value(&name, &ctx.resolved.redis_properties).await?)
    }

    async fn load_context(&self, tenant_id: Uuid) -> Result<TenantContext, ProvisioningError> {
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("Tenant '{}' not found", tenant_id)))?;
        let detail = self
            .store
            .find_config_detail(tenant_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("Tenant '{}' has no configuration detail", tenant_id)))?;
        let region = self.store.find_region(detail.region_id).await?.ok_or_else(|| {
            ProvisioningError::Resolution(format!(
                "Configuration detail {} references missing region {}",
                detail.id, detail.region_id
            ))
        })?;
        let resolved = resolve(&region, &detail.overrides);
        Ok(TenantContext {
            tenant,
            region,
            detail,
            resolved,
        })
    }

    async fn publish_context(&self, ctx: &TenantContext) -> Result<PublishReport, ProvisioningError> {
        let stage = ProvisioningStage::Published;
        let kv = self.timed(stage, "connect key-value store", self.key_value_for(ctx)).await?;
        let identity = ctx.identity();
        let snapshot = self
            .timed(stage, "publish properties", async {
                PropertyDistributor::publish(kv.as_ref(), ctx.prefix(), &ctx.resolved, &identity)
                    .await
                    .map_err(|e| resource(stage, ResourceError::Publish(e)))
            })
            .await?;
        Ok(PublishReport {
            tenant_id: ctx.tenant.id,
            prefix: ctx.prefix().clone(),
            keys: snapshot.len(),
        })
    }

    /// Retract a tenant's properties, then unlink its configuration detail.
    /// The detail row is kept; its schema name is never reused.
    pub async fn offboard(&self, tenant_id: Uuid) -> Result<OffboardingReport, ProvisioningError> {
        let ctx = self.load_context(tenant_id).await?;
        let stage = ProvisioningStage::RollingBack;
        let kv = self.timed(stage, "connect key-value store", self.key_value_for(&ctx)).await?;
        let identity = ctx.identity();

        let retracted = self
            .timed(stage, "retract properties", async {
                let data = PropertyDistributor::retract(kv.as_ref(), ctx.prefix(), &identity)
                    .await
                    .map_err(|e| resource(stage, ResourceError::Publish(e)))?;
                let bootstrap = PropertyDistributor::retract_bootstrap(kv.as_ref(), ctx.prefix())
                    .await
                    .map_err(|e| resource(stage, ResourceError::Publish(e)))?;
                Ok(data + bootstrap)
            })
            .await?;

        self.store.unlink_config_detail(tenant_id).await?;
        self.caches.invalidate(&[ASSIGNABLE_REGIONS]).await;

        info!("Offboarded tenant {} ({}), {} keys retracted", tenant_id, ctx.prefix(), retracted);
        Ok(OffboardingReport {
            tenant_id,
            prefix: ctx.prefix().clone(),
            retracted_keys: retracted,
        })
    }

    /// Re-publish one tenant's resolved configuration.
    pub async fn set_tenant_properties_by_tenant_id(&self, tenant_id: Uuid) -> Result<PublishReport, ProvisioningError> {
        let ctx = self.load_context(tenant_id).await?;
        self.publish_context(&ctx).await
    }

    /// Remove one tenant's published configuration. Bootstrap keys are left
    /// for the tenant runtime to consume.
    pub async fn unset_tenant_properties_by_tenant_id(&self, tenant_id: Uuid) -> Result<PublishReport, ProvisioningError> {
        let ctx = self.load_context(tenant_id).await?;
        let stage = ProvisioningStage::RollingBack;
        let kv = self.timed(stage, "connect key-value store", self.key_value_for(&ctx)).await?;
        let identity = ctx.identity();
        let deleted = self
            .timed(stage, "retract properties", async {
                PropertyDistributor::retract(kv.as_ref(), ctx.prefix(), &identity)
                    .await
                    .map_err(|e| resource(stage, ResourceError::Publish(e)))
            })
            .await?;
        Ok(PublishReport {
            tenant_id,
            prefix: ctx.prefix().clone(),
            keys: deleted,
        })
    }

    /// Re-publish every provisioned tenant of a region, e.g. after the
    /// region defaults changed.
    pub async fn set_tenant_properties_by_region_name(&self, region_name: &str) -> Result<RepublishReport, ProvisioningError> {
        if self.store.find_region_by_name(region_name).await?.is_none() {
            return Err(ProvisioningError::NotFound(format!("Region '{}' not found", region_name)));
        }
        let tenants = self.store.list_linked_tenants(region_name).await?;

        let mut report = RepublishReport {
            region_name: region_name.to_string(),
            published: Vec::with_capacity(tenants.len()),
            failed: Vec::new(),
        };
        for tenant in tenants {
            let outcome = match self.load_context(tenant.id).await {
                Ok(ctx) => self.publish_context(&ctx).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(published) => report.published.push(published),
                Err(e) => {
                    warn!("Republishing tenant {} in region {} failed: {}", tenant.id, region_name, e);
                    report.failed.push(RepublishFailure {
                        tenant_id: tenant.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Republished region {}: {} ok, {} failed",
            region_name,
            report.published.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Overrides replace whole groups, so a supplied connection group must be
/// usable on its own.
fn validate_overrides(overrides: &TenantOverrides) -> Result<(), ProvisioningError> {
    if let Some(db) = &overrides.db_properties {
        if db.host.trim().is_empty() || db.port == 0 || db.database.trim().is_empty() {
            return Err(ProvisioningError::Validation(
                "dbProperties override requires host, port and database".to_string(),
            ));
        }
    }
    if let Some(redis) = &overrides.redis_properties {
        if redis.host.trim().is_empty() || redis.port == 0 {
            return Err(ProvisioningError::Validation(
                "redisProperties override requires host and port".to_string(),
            ));
        }
    }
    if let Some(fs) = &overrides.file_system {
        if fs.path.trim().is_empty() {
            return Err(ProvisioningError::Validation(
                "fileSystem override requires a path".to_string(),
            ));
        }
    }
    Ok(())
}
