use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{KvError, KvHandle, KvStore};
use crate::database::models::RedisProperties;
use crate::database::registry::{ConnectionError, KvConnector};

/// Process-local store for development setups without Redis.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every key currently held.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, KvError> {
        let mut map = self.entries.write().await;
        Ok(keys.iter().filter(|key| map.remove(*key).is_some()).count())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }
}

/// Hands out one shared in-memory store for every target.
#[derive(Clone, Default)]
pub struct MemoryKvConnector {
    store: InMemoryKvStore,
}

impl MemoryKvConnector {
    pub fn new(store: InMemoryKvStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryKvStore {
        &self.store
    }
}

#[async_trait]
impl KvConnector for MemoryKvConnector {
    async fn connect(&self, _target: &str, _params: &RedisProperties) -> Result<KvHandle, ConnectionError> {
        Ok(Arc::new(self.store.clone()))
    }
}
