// distributor/mod.rs - PropertyDistributor
// Flattens a resolved configuration into prefixed key-value pairs for the
// tenant runtime, and removes them again.
//
// Key grammar:
//   ${prefix}<GROUP>_<FIELD>            one per leaf field
//   ${prefix}<GROUP>_<FIELD>_CRYPTO_IV  sibling of every secret field
//   ${prefix}TENANT_ID|TENANT_STATUS|TENANT_FQDN
//   ${prefix}ROUTING_KEYS               comma-separated routing keys last published
//   <fqdn> -> prefix, <slug> -> prefix  unprefixed routing keys
//
// Every field always yields its keys whatever its value, so the key set of a
// tenant depends only on its prefix and identity. Routing keys also depend on
// the region's root domain, which can change between publishes; the recorded
// ROUTING_KEYS entry lets publish and retract remove routes from an older
// identity.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::database::models::{
    AuthProviders, DbProperties, FileSystemProperties, JwtProperties, RedisProperties, ResolvedConfig,
    SearchProperties, SizeLimits, SmtpProperties, TenantIdentity, ThemeProperties,
};
use crate::kv::{KvError, KvStore};
use crate::types::TenantPrefix;
use crate::vault::EncryptedSecret;

pub const CRYPTO_IV_SUFFIX: &str = "_CRYPTO_IV";
pub const ROUTING_KEYS: &str = "ROUTING_KEYS";

/// A single leaf value and how it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    OptionalText(Option<String>),
    Flag(bool),
    Number(i64),
    /// Publishes `<KEY>` (content or empty) and `<KEY>_CRYPTO_IV`.
    Secret(EncryptedSecret),
}

impl PropertyValue {
    fn push(self, key: String, out: &mut Vec<(String, String)>) {
        match self {
            PropertyValue::Text(text) => out.push((key, text)),
            PropertyValue::OptionalText(text) => out.push((key, text.unwrap_or_default())),
            PropertyValue::Flag(flag) => out.push((key, flag.to_string())),
            PropertyValue::Number(n) => out.push((key, n.to_string())),
            PropertyValue::Secret(secret) => {
                out.push((format!("{}{}", key, CRYPTO_IV_SUFFIX), secret.iv));
                out.push((key, secret.content.unwrap_or_default()));
            }
        }
    }
}

/// A configuration group that knows its key-value field names.
pub trait PropertyGroup {
    const GROUP: &'static str;

    fn fields(&self) -> Vec<(&'static str, PropertyValue)>;
}

impl PropertyGroup for DbProperties {
    const GROUP: &'static str = "POSTGRES";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("HOST", PropertyValue::Text(self.host.clone())),
            ("PORT", PropertyValue::Number(self.port.into())),
            ("USER", PropertyValue::Text(self.user.clone())),
            ("PASSWORD", PropertyValue::Secret(self.password.clone())),
            ("DATABASE", PropertyValue::Text(self.database.clone())),
            ("SSL", PropertyValue::Flag(self.ssl)),
        ]
    }
}

impl PropertyGroup for RedisProperties {
    const GROUP: &'static str = "REDIS";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("HOST", PropertyValue::Text(self.host.clone())),
            ("PORT", PropertyValue::Number(self.port.into())),
            ("PASSWORD", PropertyValue::Secret(self.password.clone())),
            ("DB", PropertyValue::Number(self.db)),
        ]
    }
}

impl PropertyGroup for SearchProperties {
    const GROUP: &'static str = "ELASTICSEARCH";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("NODE", PropertyValue::Text(self.node.clone())),
            ("USERNAME", PropertyValue::Text(self.username.clone())),
            ("PASSWORD", PropertyValue::Secret(self.password.clone())),
        ]
    }
}

impl PropertyGroup for SmtpProperties {
    const GROUP: &'static str = "SMTP";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("HOST", PropertyValue::Text(self.host.clone())),
            ("PORT", PropertyValue::Number(self.port.into())),
            ("SECURE", PropertyValue::Flag(self.secure)),
            ("USER", PropertyValue::Text(self.user.clone())),
            ("PASSWORD", PropertyValue::Secret(self.password.clone())),
            ("FROM", PropertyValue::Text(self.from.clone())),
        ]
    }
}

impl PropertyGroup for JwtProperties {
    const GROUP: &'static str = "JWT";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("SECRET", PropertyValue::Secret(self.secret.clone())),
            ("ACCESS_TOKEN_TTL", PropertyValue::Number(self.access_token_ttl)),
            ("REFRESH_TOKEN_TTL", PropertyValue::Number(self.refresh_token_ttl)),
        ]
    }
}

impl PropertyGroup for AuthProviders {
    const GROUP: &'static str = "AUTH";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("LOCAL", PropertyValue::Flag(self.local)),
            ("GOOGLE", PropertyValue::Flag(self.google)),
            ("FACEBOOK", PropertyValue::Flag(self.facebook)),
            ("GOOGLE_CLIENT_ID", PropertyValue::OptionalText(self.google_client_id.clone())),
        ]
    }
}

impl PropertyGroup for FileSystemProperties {
    const GROUP: &'static str = "FILESYSTEM";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("PATH", PropertyValue::Text(self.path.clone())),
            ("PUBLIC_URL", PropertyValue::Text(self.public_url.clone())),
        ]
    }
}

impl PropertyGroup for SizeLimits {
    const GROUP: &'static str = "LIMITS";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("MAX_UPLOAD_BYTES", PropertyValue::Number(self.max_upload_bytes)),
            ("MAX_USERS", PropertyValue::Number(self.max_users)),
            ("MAX_PRODUCTS", PropertyValue::Number(self.max_products)),
        ]
    }
}

impl PropertyGroup for ThemeProperties {
    const GROUP: &'static str = "THEME";

    fn fields(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("PRIMARY_COLOR", PropertyValue::Text(self.primary_color.clone())),
            ("SECONDARY_COLOR", PropertyValue::Text(self.secondary_color.clone())),
            ("FONT_FAMILY", PropertyValue::Text(self.font_family.clone())),
        ]
    }
}

/// Ordered key-value view of one tenant's published configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySnapshot {
    entries: BTreeMap<String, String>,
}

impl PropertySnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }
}

/// First administrator handed to the tenant runtime on first start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: EncryptedSecret,
}

fn push_group<G: PropertyGroup>(prefix: &TenantPrefix, group: &G, out: &mut Vec<(String, String)>) {
    for (field, value) in group.fields() {
        value.push(format!("{}{}_{}", prefix, G::GROUP, field), out);
    }
}

fn build(prefix: &TenantPrefix, resolved: &ResolvedConfig, identity: &TenantIdentity) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(48);

    push_group(prefix, &resolved.db_properties, &mut out);
    push_group(prefix, &resolved.redis_properties, &mut out);
    push_group(prefix, &resolved.search_properties, &mut out);
    push_group(prefix, &resolved.smtp_properties, &mut out);
    push_group(prefix, &resolved.jwt_properties, &mut out);
    push_group(prefix, &resolved.auth_providers, &mut out);
    push_group(prefix, &resolved.file_system, &mut out);
    push_group(prefix, &resolved.size_limits, &mut out);
    push_group(prefix, &resolved.theme, &mut out);

    let fqdn = identity.fqdn();
    out.push((format!("{}TENANT_ID", prefix), identity.id.to_string()));
    out.push((format!("{}TENANT_STATUS", prefix), identity.status.to_string()));
    out.push((format!("{}TENANT_FQDN", prefix), fqdn.clone()));

    let mut routes = vec![fqdn];
    if let Some(slug) = identity.custom_slug() {
        routes.push(slug.to_string());
    }
    out.push((routing_record_key(prefix), routes.join(",")));
    out.extend(routes.into_iter().map(|route| (route, prefix.to_string())));
    out
}

fn routing_record_key(prefix: &TenantPrefix) -> String {
    format!("{}{}", prefix, ROUTING_KEYS)
}

fn build_bootstrap(prefix: &TenantPrefix, admin: &BootstrapAdmin) -> Vec<(String, String)> {
    let mut out = vec![(format!("{}NEW_TENANT", prefix), "true".to_string())];
    PropertyValue::Secret(admin.password.clone()).push(format!("{}SUPERADMIN_PASSWORD", prefix), &mut out);
    out.push((format!("{}SUPERADMIN_EMAIL", prefix), admin.email.clone()));
    out.push((format!("{}SUPERADMIN_FIRSTNAME", prefix), admin.first_name.clone()));
    out.push((format!("{}SUPERADMIN_LASTNAME", prefix), admin.last_name.clone()));
    out
}

/// Publishes and retracts tenant property snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyDistributor;

impl PropertyDistributor {
    pub fn snapshot(prefix: &TenantPrefix, resolved: &ResolvedConfig, identity: &TenantIdentity) -> PropertySnapshot {
        PropertySnapshot {
            entries: build(prefix, resolved, identity).into_iter().collect(),
        }
    }

    /// Every key `publish` writes for this prefix and identity.
    pub fn keys(prefix: &TenantPrefix, identity: &TenantIdentity) -> Vec<String> {
        Self::snapshot(prefix, &ResolvedConfig::default(), identity).keys()
    }

    pub fn bootstrap_keys(prefix: &TenantPrefix) -> Vec<String> {
        let template = BootstrapAdmin {
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password: EncryptedSecret::default(),
        };
        build_bootstrap(prefix, &template).into_iter().map(|(k, _)| k).collect()
    }

    pub async fn publish(
        kv: &dyn KvStore,
        prefix: &TenantPrefix,
        resolved: &ResolvedConfig,
        identity: &TenantIdentity,
    ) -> Result<PropertySnapshot, KvError> {
        let snapshot = Self::snapshot(prefix, resolved, identity);
        let previous = Self::recorded_routes(kv, prefix).await?;
        kv.set_many(&snapshot.pairs()).await?;

        let stale: Vec<String> = previous
            .into_iter()
            .filter(|route| snapshot.get(route).is_none())
            .collect();
        if !stale.is_empty() {
            let dropped = kv.delete_many(&stale).await?;
            info!("Dropped {} stale routing keys for {}: {}", dropped, prefix, stale.join(", "));
        }

        info!("Published {} properties for {} ({})", snapshot.len(), prefix, identity.fqdn());
        Ok(snapshot)
    }

    /// Routing keys recorded by an earlier publish that still point at this
    /// prefix. Routes since taken over by another tenant are not returned.
    pub async fn recorded_routes(kv: &dyn KvStore, prefix: &TenantPrefix) -> Result<Vec<String>, KvError> {
        let Some(recorded) = kv.get(&routing_record_key(prefix)).await? else {
            return Ok(Vec::new());
        };
        let mut owned = Vec::new();
        for route in recorded.split(',').filter(|route| !route.is_empty()) {
            if kv.get(route).await?.as_deref() == Some(prefix.as_str()) {
                owned.push(route.to_string());
            }
        }
        Ok(owned)
    }

    /// Deletes every key `publish` writes, plus routes recorded under an
    /// earlier identity. Returns how many existed.
    pub async fn retract(kv: &dyn KvStore, prefix: &TenantPrefix, identity: &TenantIdentity) -> Result<usize, KvError> {
        let mut keys: BTreeSet<String> = Self::keys(prefix, identity).into_iter().collect();
        keys.extend(Self::recorded_routes(kv, prefix).await?);
        let keys: Vec<String> = keys.into_iter().collect();
        let deleted = kv.delete_many(&keys).await?;
        info!("Retracted {} of {} properties for {}", deleted, keys.len(), prefix);
        Ok(deleted)
    }

    pub async fn publish_bootstrap(kv: &dyn KvStore, prefix: &TenantPrefix, admin: &BootstrapAdmin) -> Result<(), KvError> {
        kv.set_many(&build_bootstrap(prefix, admin)).await?;
        debug!("Published bootstrap admin for {}", prefix);
        Ok(())
    }

    pub async fn retract_bootstrap(kv: &dyn KvStore, prefix: &TenantPrefix) -> Result<usize, KvError> {
        kv.delete_many(&Self::bootstrap_keys(prefix)).await
    }
}
