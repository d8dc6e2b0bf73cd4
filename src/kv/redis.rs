use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{KvError, KvHandle, KvStore};
use crate::database::models::RedisProperties;
use crate::database::registry::{ConnectionError, KvConnector};
use crate::vault::CredentialVault;

/// Redis-backed store over an auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisKvStore {
    manager: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(
        host: &str,
        port: u16,
        db: i64,
        password: Option<String>,
    ) -> Result<Self, KvError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db,
                password,
                ..Default::default()
            },
        };
        let client = Client::open(info)?;
        let manager = ConnectionManager::new(client).await?;

        info!("Connected to key-value store at {}:{} (db {})", host, port, db);
        Ok(Self { manager })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), KvError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut con = self.manager.clone();
        con.mset::<_, _, ()>(entries).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.manager.clone();
        let deleted: usize = con.del(keys).await?;
        Ok(deleted)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut con = self.manager.clone();
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut con = self.manager.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}

/// Opens Redis stores from a resolved `RedisProperties` group.
pub struct RedisConnector {
    vault: Arc<CredentialVault>,
}

impl RedisConnector {
    pub fn new(vault: Arc<CredentialVault>) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl KvConnector for RedisConnector {
    async fn connect(&self, target: &str, params: &RedisProperties) -> Result<KvHandle, ConnectionError> {
        let password = self
            .vault
            .decrypt_optional(&params.password)
            .map_err(|source| ConnectionError::Credentials {
                target: target.to_string(),
                source,
            })?;

        let store = RedisKvStore::connect(&params.host, params.port, params.db, password)
            .await
            .map_err(|source| ConnectionError::KeyValue {
                target: target.to_string(),
                source,
            })?;
        Ok(Arc::new(store))
    }
}
