//! Configuration groups shared by regions (as defaults) and tenant
//! configuration details (as optional overrides).
//!
//! Each group is replaced as a whole during resolution, never merged field by
//! field.

use serde::{Deserialize, Serialize};

use crate::vault::EncryptedSecret;

/// Relational database the tenant schema lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DbProperties {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: EncryptedSecret,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
}

/// Key-value store holding the tenant's runtime property snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RedisProperties {
    pub host: String,
    pub port: u16,
    pub password: EncryptedSecret,
    #[serde(default)]
    pub db: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SearchProperties {
    pub node: String,
    pub username: String,
    pub password: EncryptedSecret,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SmtpProperties {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    pub user: String,
    #[serde(rename = "smtpAuth", alias = "password")]
    pub password: EncryptedSecret,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JwtProperties {
    pub secret: EncryptedSecret,
    /// Seconds
    pub access_token_ttl: i64,
    /// Seconds
    pub refresh_token_ttl: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthProviders {
    pub local: bool,
    pub google: bool,
    pub facebook: bool,
    #[serde(default)]
    pub google_client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileSystemProperties {
    pub path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SizeLimits {
    pub max_upload_bytes: i64,
    pub max_users: i64,
    pub max_products: i64,
}

/// Cosmetic only, so fields left out of a payload are empty rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThemeProperties {
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
}

/// The nine groups every region carries, all mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegionDefaults {
    pub db_properties: DbProperties,
    pub redis_properties: RedisProperties,
    pub search_properties: SearchProperties,
    pub smtp_properties: SmtpProperties,
    pub jwt_properties: JwtProperties,
    pub auth_providers: AuthProviders,
    pub file_system: FileSystemProperties,
    pub size_limits: SizeLimits,
    pub theme: ThemeProperties,
}

/// Tenant overrides: `None` inherits the region default for that group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantOverrides {
    pub db_properties: Option<DbProperties>,
    pub redis_properties: Option<RedisProperties>,
    pub search_properties: Option<SearchProperties>,
    pub smtp_properties: Option<SmtpProperties>,
    pub jwt_properties: Option<JwtProperties>,
    pub auth_providers: Option<AuthProviders>,
    pub file_system: Option<FileSystemProperties>,
    pub size_limits: Option<SizeLimits>,
    pub theme: Option<ThemeProperties>,
}

/// Fully merged configuration, same shape as the region defaults.
pub type ResolvedConfig = RegionDefaults;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_default_to_inherit() {
        let overrides: TenantOverrides = serde_json::from_value(json!({})).unwrap();
        assert_eq!(overrides, TenantOverrides::default());
    }

    #[test]
    fn smtp_secret_uses_smtp_auth_name() {
        let smtp: SmtpProperties = serde_json::from_value(json!({
            "host": "smtp.example.com",
            "port": 587,
            "user": "mailer",
            "smtpAuth": { "iv": "00", "content": null },
            "from": "noreply@example.com"
        }))
        .unwrap();
        assert_eq!(smtp.password.iv, "00");
        assert!(!smtp.secure);

        let back = serde_json::to_value(&smtp).unwrap();
        assert!(back.get("smtpAuth").is_some());
    }
}
