use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Resolve, provision and publish a tenant")]
    Onboard {
        #[arg(help = "Tenant ID")]
        tenant_id: String,
        #[arg(long, help = "JSON file with group overrides")]
        overrides: Option<PathBuf>,
    },

    #[command(about = "Retract a tenant's properties and unlink its configuration")]
    Offboard {
        #[arg(help = "Tenant ID")]
        tenant_id: String,
    },

    #[command(about = "Republish a tenant's properties")]
    Publish {
        #[arg(help = "Tenant ID")]
        tenant_id: String,
    },

    #[command(about = "Retract a tenant's properties, keeping its configuration")]
    Retract {
        #[arg(help = "Tenant ID")]
        tenant_id: String,
    },
}

fn read_overrides(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub async fn handle(cmd: TenantCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::Onboard { tenant_id, overrides } => {
            let body = overrides.as_deref().map(read_overrides).transpose()?;
            let report = client
                .post(&format!("/tenants/{}/configuration-detail", tenant_id), body)
                .await?;

            if let OutputFormat::Text = output_format {
                output_success(&output_format, &format!("Tenant {} onboarded", tenant_id), None)?;
                print_fields(&report, &["prefix", "regionName", "fqdn", "storageRoot", "publishedKeys", "adminEmail"]);
                return Ok(());
            }
            output_success(&output_format, "Tenant onboarded", Some(report))
        }
        TenantCommands::Offboard { tenant_id } => {
            let report = client
                .delete(&format!("/tenants/{}/configuration-detail", tenant_id))
                .await?;
            output_success(&output_format, &format!("Tenant {} offboarded", tenant_id), Some(report))
        }
        TenantCommands::Publish { tenant_id } => {
            let report = client
                .patch(&format!("/tenants/set-tenant-properties-in-redis-by-tenant-id/{}", tenant_id))
                .await?;
            let keys = report.get("keys").and_then(Value::as_u64).unwrap_or(0);
            output_success(
                &output_format,
                &format!("Published {} keys for tenant {}", keys, tenant_id),
                Some(report),
            )
        }
        TenantCommands::Retract { tenant_id } => {
            let report = client
                .patch(&format!("/tenants/unset-tenant-properties-in-redis-by-tenant-id/{}", tenant_id))
                .await?;
            let keys = report.get("keys").and_then(Value::as_u64).unwrap_or(0);
            output_success(
                &output_format,
                &format!("Retracted {} keys for tenant {}", keys, tenant_id),
                Some(report),
            )
        }
    }
}
