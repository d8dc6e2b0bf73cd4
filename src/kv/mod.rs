// kv/mod.rs - Runtime key-value store
// The downstream tenant runtime reads its configuration from here

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use self::memory::{InMemoryKvStore, MemoryKvConnector};
pub use self::redis::{RedisConnector, RedisKvStore};

#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    #[error("Key-value store unavailable: {0}")]
    Unavailable(String),
}

/// Flat string key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write every pair. Existing values are overwritten.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError>;

    /// Delete the keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize, KvError>;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn ping(&self) -> Result<(), KvError>;
}

/// Shared handle cached by the connection registry.
pub type KvHandle = Arc<dyn KvStore>;
