// database/registry.rs - ConnectionRegistry
// Lazily opened, never evicted client handles keyed by logical target name

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::database::error::DatabaseError;
use crate::database::models::{DbProperties, RedisProperties};
use crate::kv::{KvError, KvHandle};
use crate::types::TenantPrefix;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Database connection to '{target}' failed: {source}")]
    Database {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Key-value connection to '{target}' failed: {source}")]
    KeyValue {
        target: String,
        #[source]
        source: KvError,
    },

    #[error("Credentials for '{target}' could not be decrypted: {source}")]
    Credentials {
        target: String,
        #[source]
        source: VaultError,
    },
}

/// Database handle as seen by the provisioning steps.
#[async_trait]
pub trait TenantDatabase: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

pub type DbHandle = Arc<dyn TenantDatabase>;

#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn connect(&self, target: &str, params: &DbProperties) -> Result<DbHandle, ConnectionError>;
}

#[async_trait]
pub trait KvConnector: Send + Sync {
    async fn connect(&self, target: &str, params: &RedisProperties) -> Result<KvHandle, ConnectionError>;
}

/// Registry name for a resource: the region name when the region's shared
/// resource is used, region name + tenant prefix when the tenant brings its own.
pub fn target_name(region_name: &str, prefix: &TenantPrefix, dedicated: bool) -> String {
    if dedicated {
        format!("{}{}", region_name, prefix)
    } else {
        region_name.to_string()
    }
}

/// Keyed handle cache with single-flight creation per name.
///
/// Concurrent callers asking for the same name wait on one connect attempt.
/// A failed attempt leaves the slot empty so a later call retries.
pub struct HandleRegistry<H> {
    kind: &'static str,
    slots: Mutex<HashMap<String, Arc<OnceCell<H>>>>,
}

impl<H: Clone> HandleRegistry<H> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_connect<F, Fut, E>(&self, name: &str, connect: F) -> Result<H, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(handle) = slot.get() {
            debug!("Reusing {} handle for: {}", self.kind, name);
            return Ok(handle.clone());
        }

        let handle = slot
            .get_or_try_init(|| async move {
                let handle = connect().await?;
                info!("Created {} handle for: {}", self.kind, name);
                Ok::<H, E>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    /// Number of live handles.
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, name: &str) -> bool {
        let slots = self.slots.lock().await;
        slots.get(name).map(|slot| slot.initialized()).unwrap_or(false)
    }

    pub async fn names(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Database and key-value handles, cached independently.
///
/// Built once at process start and shared; nothing is closed for the lifetime
/// of the process since regions and tenants are long lived.
pub struct ConnectionRegistry {
    databases: HandleRegistry<DbHandle>,
    key_values: HandleRegistry<KvHandle>,
    db_connector: Arc<dyn DatabaseConnector>,
    kv_connector: Arc<dyn KvConnector>,
}

impl ConnectionRegistry {
    pub fn new(db_connector: Arc<dyn DatabaseConnector>, kv_connector: Arc<dyn KvConnector>) -> Self {
        Self {
            databases: HandleRegistry::new("database"),
            key_values: HandleRegistry::new("key-value"),
            db_connector,
            kv_connector,
        }
    }

    pub async fn database(&self, name: &str, params: &DbProperties) -> Result<DbHandle, ConnectionError> {
        self.databases
            .get_or_connect(name, || self.db_connector.connect(name, params))
            .await
    }

    pub async fn key_value(&self, name: &str, params: &RedisProperties) -> Result<KvHandle, ConnectionError> {
        self.key_values
            .get_or_connect(name, || self.kv_connector.connect(name, params))
            .await
    }

    pub fn databases(&self) -> &HandleRegistry<DbHandle> {
        &self.databases
    }

    pub fn key_values(&self) -> &HandleRegistry<KvHandle> {
        &self.key_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingDbConnector, CountingKvConnector};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn target_name_appends_prefix_only_for_dedicated() {
        let prefix = TenantPrefix::from_uuid(Uuid::nil());
        assert_eq!(target_name("eu-1", &prefix, false), "eu-1");
        assert_eq!(
            target_name("eu-1", &prefix, true),
            "eu-1_00000000000000000000000000000000_"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_open_one_handle() {
        let db = Arc::new(CountingDbConnector::with_delay(Duration::from_millis(50)));
        let kv = Arc::new(CountingKvConnector::default());
        let registry = Arc::new(ConnectionRegistry::new(db.clone(), kv));
        let params = DbProperties::default();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let params = params.clone();
                tokio::spawn(async move { registry.database("eu-1", &params).await })
            })
            .collect();

        let handles: Vec<DbHandle> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(db.connects(), 1);
        assert_eq!(registry.databases().len().await, 1);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_handles() {
        let db = Arc::new(CountingDbConnector::default());
        let kv = Arc::new(CountingKvConnector::default());
        let registry = ConnectionRegistry::new(db.clone(), kv.clone());

        let shared = registry.database("eu-1", &DbProperties::default()).await.unwrap();
        let dedicated = registry
            .database("eu-1_abc_", &DbProperties::default())
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&shared, &dedicated));
        assert_eq!(db.connects(), 2);

        // Database and key-value caches are independent
        registry.key_value("eu-1", &RedisProperties::default()).await.unwrap();
        assert_eq!(kv.connects(), 1);
        assert_eq!(registry.databases().names().await, vec!["eu-1", "eu-1_abc_"]);
        assert!(registry.key_values().contains("eu-1").await);
    }

    #[tokio::test]
    async fn failed_connect_is_retried_later() {
        let registry: HandleRegistry<u32> = HandleRegistry::new("test");
        let attempts = AtomicUsize::new(0);

        let first: Result<u32, String> = registry
            .get_or_connect("eu-1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("refused".to_string())
            })
            .await;
        assert!(first.is_err());
        assert!(!registry.contains("eu-1").await);

        let second: Result<u32, String> = registry
            .get_or_connect("eu-1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(second.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len().await, 1);
    }
}
