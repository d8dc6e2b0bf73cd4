// app.rs - Application state and router
// Components are constructed once here and injected; nothing is global
// except the configuration singleton.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, patch, post, put};
use axum::{Extension, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::CacheInvalidator;
use crate::config::{AppConfig, KeyValueBackend};
use crate::database::pg::{self, PgConnector};
use crate::database::registry::{ConnectionRegistry, KvConnector};
use crate::database::store::{PgTenantStore, TenantStore};
use crate::handlers;
use crate::kv::{MemoryKvConnector, RedisConnector};
use crate::services::mailer::{HttpMailer, LogMailer, Mailer};
use crate::services::provisioning::ProvisioningOrchestrator;
use crate::services::regions::RegionService;
use crate::storage::DirectoryProvisioner;
use crate::vault::CredentialVault;

pub struct AppState {
    pub store: Arc<dyn TenantStore>,
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub regions: Arc<RegionService>,
    pub vault: Arc<CredentialVault>,
}

impl AppState {
    /// Wire every component from configuration. The main pool is lazy, so
    /// this succeeds while the database is still unreachable.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let vault = Arc::new(CredentialVault::from_secret(&config.vault.secret_key)?);
        let pool = pg::main_pool(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.connection_timeout),
        )
        .context("failed to configure main database pool")?;

        if config.database.run_migrations {
            // Not fatal: /health reports the database state
            if let Err(e) = pg::run_migrations(&pool).await {
                warn!("Migrations not applied: {}", e);
            }
        }
        let store: Arc<dyn TenantStore> = Arc::new(PgTenantStore::new(pool));

        let db_connector = Arc::new(PgConnector::new(
            vault.clone(),
            config.database.tenant_max_connections,
            Duration::from_secs(config.database.connection_timeout),
        ));
        let kv_connector: Arc<dyn KvConnector> = match config.key_value.backend {
            KeyValueBackend::Redis => Arc::new(RedisConnector::new(vault.clone())),
            KeyValueBackend::Memory => {
                warn!("Using in-memory key-value store; published properties are not shared");
                Arc::new(MemoryKvConnector::default())
            }
        };
        let registry = Arc::new(ConnectionRegistry::new(db_connector, kv_connector));

        let mailer: Arc<dyn Mailer> = match &config.mail.relay_url {
            Some(url) => Arc::new(HttpMailer::new(url.clone(), Duration::from_secs(config.mail.timeout_secs))?),
            None => Arc::new(LogMailer),
        };

        Ok(Self::assemble(
            store,
            registry,
            vault,
            DirectoryProvisioner::new(config.storage.template_dir.clone()),
            mailer,
            config,
        ))
    }

    pub fn assemble(
        store: Arc<dyn TenantStore>,
        registry: Arc<ConnectionRegistry>,
        vault: Arc<CredentialVault>,
        directories: DirectoryProvisioner,
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
    ) -> Self {
        let mut caches = CacheInvalidator::new();
        let regions = Arc::new(RegionService::new(
            store.clone(),
            Duration::from_secs(config.api.cache_ttl_secs),
            &mut caches,
        ));
        let orchestrator = Arc::new(ProvisioningOrchestrator::new(
            store.clone(),
            registry,
            vault.clone(),
            directories,
            mailer,
            caches,
            config.provisioning_settings(),
        ));

        Self {
            store,
            orchestrator,
            regions,
            vault,
        }
    }
}

pub fn app(state: Arc<AppState>, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .merge(tenant_routes())
        .merge(region_routes())
        .merge(vault_routes())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http());

    if config.api.enable_cors {
        let origins: Vec<HeaderValue> = config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
                .allow_headers(Any),
        );
    }
    router
}

fn tenant_routes() -> Router {
    use handlers::tenants;

    Router::new()
        .route(
            "/tenants/:id/configuration-detail",
            post(tenants::configuration_detail_post).delete(tenants::configuration_detail_delete),
        )
        .route(
            "/tenants/set-tenant-properties-in-redis-by-region-name/:region_name",
            patch(tenants::set_properties_by_region_name),
        )
        .route(
            "/tenants/set-tenant-properties-in-redis-by-tenant-id/:id",
            patch(tenants::set_properties_by_tenant_id),
        )
        .route(
            "/tenants/unset-tenant-properties-in-redis-by-tenant-id/:id",
            patch(tenants::unset_properties_by_tenant_id),
        )
}

fn region_routes() -> Router {
    use handlers::regions;

    Router::new()
        .route("/regions", get(regions::regions_get).post(regions::regions_post))
        .route("/regions/assignable", get(regions::regions_assignable_get))
        .route("/regions/:name", put(regions::region_put))
}

fn vault_routes() -> Router {
    use handlers::vault;

    Router::new()
        .route("/vault/encrypt", post(vault::encrypt_post))
        .route("/vault/password", post(vault::password_post))
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config).await?);
    let router = app(state, config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Tenant provisioner listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
