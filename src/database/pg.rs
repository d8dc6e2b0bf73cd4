// database/pg.rs - PostgreSQL handles
// Main store pool plus per-region (or per-tenant) provisioning pools

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::database::error::DatabaseError;
use crate::database::models::DbProperties;
use crate::database::registry::{ConnectionError, DatabaseConnector, DbHandle, TenantDatabase};
use crate::vault::CredentialVault;

/// Open the main store pool without connecting, so the process can start
/// while the database is still unreachable.
pub fn main_pool(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<PgPool, DatabaseError> {
    if database_url.is_empty() {
        return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
    }
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Main store migrations applied");
    Ok(())
}

/// Pings the main pool to ensure connectivity
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A region (or tenant-dedicated) database reached through its own pool.
#[derive(Clone)]
pub struct PgTenantDatabase {
    pool: PgPool,
}

impl PgTenantDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TenantDatabase for PgTenantDatabase {
    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        sqlx::query(statement).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        health_check(&self.pool).await
    }
}

/// Opens pools from a resolved `DbProperties` group, decrypting the password
/// with the vault.
pub struct PgConnector {
    vault: Arc<CredentialVault>,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(vault: Arc<CredentialVault>, max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            vault,
            max_connections,
            acquire_timeout,
        }
    }

    fn connect_options(&self, target: &str, params: &DbProperties) -> Result<PgConnectOptions, ConnectionError> {
        let password = self
            .vault
            .decrypt_optional(&params.password)
            .map_err(|source| ConnectionError::Credentials {
                target: target.to_string(),
                source,
            })?;

        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .database(&params.database)
            .ssl_mode(if params.ssl { PgSslMode::Require } else { PgSslMode::Prefer });
        if let Some(password) = password {
            options = options.password(&password);
        }
        Ok(options)
    }
}

#[async_trait]
impl DatabaseConnector for PgConnector {
    async fn connect(&self, target: &str, params: &DbProperties) -> Result<DbHandle, ConnectionError> {
        let options = self.connect_options(target, params)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|source| ConnectionError::Database {
                target: target.to_string(),
                source,
            })?;

        info!(
            "Created database pool for {} ({}:{}/{})",
            target, params.host, params.port, params.database
        );
        Ok(Arc::new(PgTenantDatabase::new(pool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("_abc_"), "\"_abc_\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn undecryptable_password_is_a_credentials_error() {
        let vault = Arc::new(CredentialVault::from_secret("k").unwrap());
        let connector = PgConnector::new(vault, 5, Duration::from_secs(1));
        let params = DbProperties {
            host: "localhost".into(),
            port: 5432,
            user: "app".into(),
            password: crate::vault::EncryptedSecret {
                iv: "not-hex".into(),
                content: Some("00".into()),
            },
            database: "app".into(),
            ssl: false,
        };
        assert!(matches!(
            connector.connect_options("eu-1", &params),
            Err(ConnectionError::Credentials { .. })
        ));
    }

    #[test]
    fn main_pool_requires_url() {
        assert!(matches!(
            main_pool("", 5, Duration::from_secs(1)),
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }
}
