// testing/mod.rs - In-process fakes for unit tests
// Every fake shares its state through Arcs so a test can keep a clone and
// inspect what the code under test did.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::models::*;
use crate::database::registry::{ConnectionError, DatabaseConnector, DbHandle, KvConnector, TenantDatabase};
use crate::database::store::TenantStore;
use crate::kv::{InMemoryKvStore, KvError, KvHandle, KvStore};
use crate::services::mailer::{EmailMessage, MailError, Mailer};

pub mod fixtures {
    use super::*;
    use crate::vault::EncryptedSecret;

    fn secret(n: u8, tag: &str) -> EncryptedSecret {
        EncryptedSecret {
            iv: format!("{:024x}", n),
            content: Some(format!("{}{:02x}", hex_tag(tag), n)),
        }
    }

    fn hex_tag(tag: &str) -> String {
        tag.bytes().map(|b| format!("{:02x}", b)).collect()
    }

    /// Region whose every group differs from any other fixture region.
    /// `r1` carries database host `10.0.0.1`, `r2` carries `10.0.0.2`.
    pub fn region(name: &str) -> Region {
        let n: u8 = name.trim_start_matches('r').parse().unwrap_or(9);
        let now = Utc::now();
        Region {
            id: Uuid::new_v4(),
            name: name.to_string(),
            root_domain_name: format!("{}.example.com", name),
            capacity: 10,
            defaults: RegionDefaults {
                db_properties: DbProperties {
                    host: format!("10.0.0.{}", n),
                    port: 5432,
                    user: format!("{}_admin", name),
                    password: secret(n, "db"),
                    database: format!("{}_tenants", name),
                    ssl: n % 2 == 0,
                },
                redis_properties: RedisProperties {
                    host: format!("10.0.1.{}", n),
                    port: 6379,
                    password: secret(n, "redis"),
                    db: n.into(),
                },
                search_properties: SearchProperties {
                    node: format!("http://10.0.2.{}:9200", n),
                    username: format!("{}_search", name),
                    password: secret(n, "es"),
                },
                smtp_properties: SmtpProperties {
                    host: format!("smtp.{}.example.com", name),
                    port: 587,
                    secure: n % 2 == 1,
                    user: format!("mailer@{}.example.com", name),
                    password: secret(n, "smtp"),
                    from: format!("noreply@{}.example.com", name),
                },
                jwt_properties: JwtProperties {
                    secret: secret(n, "jwt"),
                    access_token_ttl: 900 * i64::from(n),
                    refresh_token_ttl: 86_400 * i64::from(n),
                },
                auth_providers: AuthProviders {
                    local: true,
                    google: n % 2 == 0,
                    facebook: false,
                    google_client_id: (n % 2 == 0).then(|| format!("{}.apps.googleusercontent.com", name)),
                },
                file_system: FileSystemProperties {
                    path: format!("/srv/{}/files", name),
                    public_url: format!("https://cdn.{}.example.com", name),
                },
                size_limits: SizeLimits {
                    max_upload_bytes: 1_048_576 * i64::from(n),
                    max_users: 50 * i64::from(n),
                    max_products: 500 * i64::from(n),
                },
                theme: ThemeProperties {
                    primary_color: format!("#0000{:02x}", n),
                    secondary_color: format!("#00{:02x}00", n),
                    font_family: format!("Font{}", n),
                },
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn region_input(name: &str) -> RegionInput {
        let region = region(name);
        RegionInput {
            name: region.name,
            root_domain_name: region.root_domain_name,
            capacity: region.capacity,
            defaults: region.defaults,
        }
    }

    pub fn tenant(region: &Region, sub_domain_name: &str) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            sub_domain_name: sub_domain_name.to_string(),
            custom_url_slug: Some(format!("{}-shop", sub_domain_name)),
            region_name: region.name.clone(),
            region_root_domain_name: region.root_domain_name.clone(),
            status: TenantStatus::Active,
            config_detail_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Records statements instead of running them.
#[derive(Clone, Default)]
pub struct RecordingDatabase {
    statements: Arc<Mutex<Vec<String>>>,
    reject_duplicates: bool,
    fail: Arc<AtomicBool>,
}

impl RecordingDatabase {
    /// Repeating a statement fails, like `CREATE SCHEMA` on an existing schema.
    pub fn rejecting_duplicate_schemas() -> Self {
        Self {
            reject_duplicates: true,
            ..Default::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantDatabase for RecordingDatabase {
    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut statements = self.statements.lock().unwrap();
        if self.reject_duplicates && statements.iter().any(|s| s == statement) {
            return Err(DatabaseError::Duplicate(statement.to_string()));
        }
        statements.push(statement.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Counts connect calls and hands out one shared `RecordingDatabase`.
#[derive(Default)]
pub struct CountingDbConnector {
    connects: AtomicUsize,
    delay: Option<Duration>,
    unreachable: AtomicBool,
    database: RecordingDatabase,
}

impl CountingDbConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            database: RecordingDatabase::rejecting_duplicate_schemas(),
            ..Default::default()
        }
    }

    pub fn rejecting_duplicates() -> Self {
        Self {
            database: RecordingDatabase::rejecting_duplicate_schemas(),
            ..Default::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn database(&self) -> &RecordingDatabase {
        &self.database
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseConnector for CountingDbConnector {
    async fn connect(&self, target: &str, _params: &DbProperties) -> Result<DbHandle, ConnectionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Database {
                target: target.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(Arc::new(self.database.clone()))
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyKvStore {
    inner: InMemoryKvStore,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl FlakyKvStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            // Partial write before failing, like a dropped connection mid-batch
            let half = entries.len() / 2;
            self.inner.set_many(&entries[..half]).await?;
            return Err(KvError::Unavailable("write refused".into()));
        }
        self.inner.set_many(entries).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, KvError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable("delete refused".into()));
        }
        self.inner.delete_many(keys).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key).await
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }
}

/// Counts connect calls and hands out one shared `FlakyKvStore`.
#[derive(Default)]
pub struct CountingKvConnector {
    connects: AtomicUsize,
    store: FlakyKvStore,
}

impl CountingKvConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &FlakyKvStore {
        &self.store
    }
}

#[async_trait]
impl KvConnector for CountingKvConnector {
    async fn connect(&self, _target: &str, _params: &RedisProperties) -> Result<KvHandle, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.store.clone()))
    }
}

#[derive(Default)]
struct StoreState {
    regions: Vec<Region>,
    tenants: HashMap<Uuid, Tenant>,
    details: Vec<TenantConfigDetail>,
}

/// `TenantStore` over plain collections with the same uniqueness rules as
/// the migrations.
#[derive(Clone, Default)]
pub struct InMemoryTenantStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTenantStore {
    pub fn add_region(&self, region: Region) {
        self.state.lock().unwrap().regions.push(region);
    }

    pub fn add_tenant(&self, tenant: Tenant) {
        self.state.lock().unwrap().tenants.insert(tenant.id, tenant);
    }

    pub fn tenant(&self, id: Uuid) -> Option<Tenant> {
        self.state.lock().unwrap().tenants.get(&id).cloned()
    }

    /// Drop a tenant's detail row while leaving the tenant pointing at it.
    pub fn forget_detail(&self, tenant_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .details
            .retain(|d| d.tenant_id != Some(tenant_id));
    }

    /// All details, linked or not.
    pub fn details(&self) -> Vec<TenantConfigDetail> {
        self.state.lock().unwrap().details.clone()
    }
}

fn linked_count(state: &StoreState, region_name: &str) -> usize {
    state
        .tenants
        .values()
        .filter(|t| t.region_name == region_name && t.config_detail_id.is_some())
        .count()
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn list_regions(&self) -> Result<Vec<Region>, DatabaseError> {
        let mut regions = self.state.lock().unwrap().regions.clone();
        regions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(regions)
    }

    async fn list_assignable_regions(&self) -> Result<Vec<Region>, DatabaseError> {
        let state = self.state.lock().unwrap();
        let mut regions: Vec<Region> = state
            .regions
            .iter()
            .filter(|r| (linked_count(&state, &r.name) as i64) < i64::from(r.capacity))
            .cloned()
            .collect();
        regions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(regions)
    }

    async fn find_region(&self, id: Uuid) -> Result<Option<Region>, DatabaseError> {
        Ok(self.state.lock().unwrap().regions.iter().find(|r| r.id == id).cloned())
    }

    async fn find_region_by_name(&self, name: &str) -> Result<Option<Region>, DatabaseError> {
        Ok(self.state.lock().unwrap().regions.iter().find(|r| r.name == name).cloned())
    }

    async fn create_region(&self, input: &RegionInput) -> Result<Region, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        if state.regions.iter().any(|r| r.name == input.name) {
            return Err(DatabaseError::Duplicate(format!("region '{}'", input.name)));
        }
        let now = Utc::now();
        let region = Region {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            root_domain_name: input.root_domain_name.clone(),
            capacity: input.capacity,
            defaults: input.defaults.clone(),
            created_at: now,
            updated_at: now,
        };
        state.regions.push(region.clone());
        Ok(region)
    }

    async fn update_region(&self, name: &str, input: &RegionInput) -> Result<Region, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        let region = state
            .regions
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| DatabaseError::NotFound(format!("region '{}'", name)))?;
        region.root_domain_name = input.root_domain_name.clone();
        region.capacity = input.capacity;
        region.defaults = input.defaults.clone();
        region.updated_at = Utc::now();
        let updated = region.clone();

        for tenant in state.tenants.values_mut().filter(|t| t.region_name == name) {
            tenant.region_root_domain_name = updated.root_domain_name.clone();
        }
        Ok(updated)
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError> {
        Ok(self.tenant(id))
    }

    async fn list_linked_tenants(&self, region_name: &str) -> Result<Vec<Tenant>, DatabaseError> {
        let state = self.state.lock().unwrap();
        let mut tenants: Vec<Tenant> = state
            .tenants
            .values()
            .filter(|t| t.region_name == region_name && t.config_detail_id.is_some())
            .cloned()
            .collect();
        tenants.sort_by(|a, b| a.sub_domain_name.cmp(&b.sub_domain_name));
        Ok(tenants)
    }

    async fn find_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .details
            .iter()
            .find(|d| d.tenant_id == Some(tenant_id))
            .cloned())
    }

    async fn create_config_detail(&self, new: NewTenantConfigDetail) -> Result<TenantConfigDetail, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        if state.details.iter().any(|d| d.db_schema == new.db_schema) {
            return Err(DatabaseError::Duplicate(format!("schema '{}'", new.db_schema)));
        }
        let tenant = state
            .tenants
            .get_mut(&new.tenant_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("tenant '{}'", new.tenant_id)))?;
        if tenant.config_detail_id.is_some() {
            return Err(DatabaseError::Duplicate(format!("configuration of tenant '{}'", new.tenant_id)));
        }

        let now = Utc::now();
        let detail = TenantConfigDetail {
            id: Uuid::new_v4(),
            tenant_id: Some(new.tenant_id),
            region_id: new.region_id,
            db_schema: new.db_schema,
            overrides: new.overrides,
            created_at: now,
            updated_at: now,
        };
        tenant.config_detail_id = Some(detail.id);
        state.details.push(detail.clone());
        Ok(detail)
    }

    async fn unlink_config_detail(&self, tenant_id: Uuid) -> Result<Option<TenantConfigDetail>, DatabaseError> {
        let mut state = self.state.lock().unwrap();
        let Some(detail) = state.details.iter_mut().find(|d| d.tenant_id == Some(tenant_id)) else {
            return Ok(None);
        };
        let before = detail.clone();
        detail.tenant_id = None;
        detail.updated_at = Utc::now();
        if let Some(tenant) = state.tenants.get_mut(&tenant_id) {
            tenant.config_detail_id = None;
        }
        Ok(Some(before))
    }
}

/// Keeps every message it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
