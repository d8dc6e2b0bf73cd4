// storage/mod.rs - DirectoryProvisioner
// Materializes a tenant's file-storage subtree from template assets

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::types::TenantPrefix;

/// Directories created under `<root>/<prefix>/`.
pub const TENANT_DIRECTORIES: &[&str] = &[
    "photos/users",
    "photos/products",
    "general",
    "logos",
    "theme/css",
    "theme/js",
    "theme/img",
];

/// Template asset file name and the tenant directory it is copied into.
pub const TEMPLATE_ASSETS: &[(&str, &str)] = &[
    ("blank-user-avatar.png", "photos/users"),
    ("blank-logo-avatar.png", "logos"),
];

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Storage root path is not configured")]
    MissingRoot,

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy template {from} to {to}: {source}")]
    CopyTemplate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copies template assets into freshly created tenant subtrees.
#[derive(Debug, Clone)]
pub struct DirectoryProvisioner {
    template_dir: PathBuf,
}

impl DirectoryProvisioner {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Root of the tenant subtree.
    pub fn tenant_root(root_path: &Path, prefix: &TenantPrefix) -> PathBuf {
        root_path.join(prefix.as_str())
    }

    /// Create every tenant directory (create-if-absent) and copy the
    /// placeholder assets, overwriting earlier copies. Returns the tenant root.
    pub async fn materialize(&self, root_path: &Path, prefix: &TenantPrefix) -> Result<PathBuf, DirectoryError> {
        if root_path.as_os_str().is_empty() {
            return Err(DirectoryError::MissingRoot);
        }
        let tenant_root = Self::tenant_root(root_path, prefix);

        for dir in TENANT_DIRECTORIES {
            let path = tenant_root.join(dir);
            fs::create_dir_all(&path)
                .await
                .map_err(|source| DirectoryError::CreateDir { path, source })?;
        }

        for (asset, dir) in TEMPLATE_ASSETS {
            let from = self.template_dir.join(asset);
            let to = tenant_root.join(dir).join(asset);
            fs::copy(&from, &to)
                .await
                .map_err(|source| DirectoryError::CopyTemplate { from, to, source })?;
        }

        info!("Materialized storage for {} at {}", prefix, tenant_root.display());
        Ok(tenant_root)
    }
}
