use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::provisioning::ProvisioningSettings;

/// Vault key used when `VAULT_SECRET_KEY` is unset. Refused in production.
pub const DEVELOPMENT_VAULT_KEY: &str = "development-only-vault-key";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub key_value: KeyValueConfig,
    pub vault: VaultConfig,
    pub storage: StorageConfig,
    pub provisioning: ProvisioningConfig,
    pub mail: MailConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Main store holding regions, tenants and configuration details
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Pool size for each region database opened during provisioning
    pub tenant_max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValueBackend {
    /// One Redis connection per region, from the region's `redisProperties`
    Redis,
    /// Single process-local store, for local runs without Redis
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueConfig {
    pub backend: KeyValueBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub template_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub step_timeout_secs: u64,
    pub admin_email_user: String,
    pub admin_first_name: String,
    pub admin_last_name: String,
    pub notification_sender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// HTTP relay receiving `{to, from, subject, text}`; log only when unset
    pub relay_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("VAULT_SECRET_KEY must be set in {0:?}")]
    DevelopmentVaultKey(Environment),
    #[error("VAULT_SECRET_KEY is empty")]
    EmptyVaultKey,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_TENANT_MAX_CONNECTIONS") {
            self.database.tenant_max_connections = v.parse().unwrap_or(self.database.tenant_max_connections);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Key-value overrides
        match env::var("KV_BACKEND").as_deref() {
            Ok("memory") => self.key_value.backend = KeyValueBackend::Memory,
            Ok("redis") => self.key_value.backend = KeyValueBackend::Redis,
            _ => {}
        }

        // Vault overrides
        if let Ok(v) = env::var("VAULT_SECRET_KEY") {
            self.vault.secret_key = v;
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_TEMPLATE_DIR") {
            self.storage.template_dir = PathBuf::from(v);
        }

        // Provisioning overrides
        if let Ok(v) = env::var("PROVISIONING_STEP_TIMEOUT_SECS") {
            self.provisioning.step_timeout_secs = v.parse().unwrap_or(self.provisioning.step_timeout_secs);
        }
        if let Ok(v) = env::var("PROVISIONING_ADMIN_EMAIL_USER") {
            self.provisioning.admin_email_user = v;
        }
        if let Ok(v) = env::var("PROVISIONING_ADMIN_FIRST_NAME") {
            self.provisioning.admin_first_name = v;
        }
        if let Ok(v) = env::var("PROVISIONING_ADMIN_LAST_NAME") {
            self.provisioning.admin_last_name = v;
        }
        if let Ok(v) = env::var("PROVISIONING_NOTIFICATION_SENDER") {
            self.provisioning.notification_sender = v;
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_RELAY_URL") {
            self.mail.relay_url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Ok(v) = env::var("MAIL_TIMEOUT_SECS") {
            self.mail.timeout_secs = v.parse().unwrap_or(self.mail.timeout_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
        if let Ok(v) = env::var("API_CORS_ORIGINS") {
            self.api.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("API_CACHE_TTL_SECS") {
            self.api.cache_ttl_secs = v.parse().unwrap_or(self.api.cache_ttl_secs);
        }

        self
    }

    /// Reject settings the server must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault.secret_key.is_empty() {
            return Err(ConfigError::EmptyVaultKey);
        }
        if self.environment != Environment::Development && self.vault.secret_key == DEVELOPMENT_VAULT_KEY {
            return Err(ConfigError::DevelopmentVaultKey(self.environment));
        }
        Ok(())
    }

    pub fn provisioning_settings(&self) -> ProvisioningSettings {
        ProvisioningSettings {
            step_timeout: Duration::from_secs(self.provisioning.step_timeout_secs),
            admin_email_user: self.provisioning.admin_email_user.clone(),
            admin_first_name: self.provisioning.admin_first_name.clone(),
            admin_last_name: self.provisioning.admin_last_name.clone(),
            notification_sender: self.provisioning.notification_sender.clone(),
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "postgres://postgres@localhost:5432/tenant_provisioner".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                tenant_max_connections: 2,
                run_migrations: true,
            },
            key_value: KeyValueConfig {
                backend: KeyValueBackend::Memory,
            },
            vault: VaultConfig {
                secret_key: DEVELOPMENT_VAULT_KEY.to_string(),
            },
            storage: StorageConfig {
                template_dir: PathBuf::from("assets/templates"),
            },
            provisioning: ProvisioningConfig {
                step_timeout_secs: 30,
                admin_email_user: "admin".to_string(),
                admin_first_name: "Super".to_string(),
                admin_last_name: "Admin".to_string(),
                notification_sender: "noreply@localhost".to_string(),
            },
            mail: MailConfig {
                relay_url: None,
                timeout_secs: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                cache_ttl_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
                tenant_max_connections: 4,
                run_migrations: true,
            },
            key_value: KeyValueConfig {
                backend: KeyValueBackend::Redis,
            },
            vault: VaultConfig {
                secret_key: DEVELOPMENT_VAULT_KEY.to_string(),
            },
            storage: StorageConfig {
                template_dir: PathBuf::from("assets/templates"),
            },
            provisioning: ProvisioningConfig {
                step_timeout_secs: 15,
                admin_email_user: "admin".to_string(),
                admin_first_name: "Super".to_string(),
                admin_last_name: "Admin".to_string(),
                notification_sender: "noreply@staging.example.com".to_string(),
            },
            mail: MailConfig {
                relay_url: None,
                timeout_secs: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                cache_ttl_secs: 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
                tenant_max_connections: 8,
                run_migrations: false,
            },
            key_value: KeyValueConfig {
                backend: KeyValueBackend::Redis,
            },
            vault: VaultConfig {
                secret_key: DEVELOPMENT_VAULT_KEY.to_string(),
            },
            storage: StorageConfig {
                template_dir: PathBuf::from("/usr/share/tenant-provisioner/templates"),
            },
            provisioning: ProvisioningConfig {
                step_timeout_secs: 10,
                admin_email_user: "admin".to_string(),
                admin_first_name: "Super".to_string(),
                admin_last_name: "Admin".to_string(),
                notification_sender: "noreply@example.com".to_string(),
            },
            mail: MailConfig {
                relay_url: None,
                timeout_secs: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_cors: false,
                cors_origins: vec!["https://admin.example.com".to_string()],
                cache_ttl_secs: 300,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.key_value.backend, KeyValueBackend::Memory);
        assert!(config.database.run_migrations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.key_value.backend, KeyValueBackend::Redis);
        assert!(!config.api.enable_cors);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DevelopmentVaultKey(Environment::Production))
        ));
    }

    #[test]
    fn production_accepts_a_real_vault_key() {
        let mut config = AppConfig::production();
        config.vault.secret_key = "d3f1c0a9-real-key".to_string();
        assert!(config.validate().is_ok());

        config.vault.secret_key.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyVaultKey)));
    }

    #[test]
    fn provisioning_settings_follow_config() {
        let config = AppConfig::staging();
        let settings = config.provisioning_settings();
        assert_eq!(settings.step_timeout, Duration::from_secs(15));
        assert_eq!(settings.notification_sender, "noreply@staging.example.com");
    }
}
