use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum RegionCommands {
    #[command(about = "List regions")]
    List {
        #[arg(long, help = "Only regions accepting new tenants")]
        assignable: bool,
    },

    #[command(about = "Republish every tenant linked to a region")]
    Publish {
        #[arg(help = "Region name")]
        name: String,
    },
}

pub async fn handle(cmd: RegionCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        RegionCommands::List { assignable } => {
            let path = if assignable { "/regions/assignable" } else { "/regions" };
            let regions = client.get(path).await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&regions)?),
                OutputFormat::Text => {
                    println!("{:<15} {:<30} {}", "NAME", "ROOT DOMAIN", "CAPACITY");
                    println!("{}", "-".repeat(55));
                    for region in regions.as_array().into_iter().flatten() {
                        println!(
                            "{:<15} {:<30} {}",
                            region.get("name").and_then(Value::as_str).unwrap_or("-"),
                            region.get("rootDomainName").and_then(Value::as_str).unwrap_or("-"),
                            region.get("capacity").and_then(Value::as_i64).unwrap_or(0),
                        );
                    }
                }
            }
            Ok(())
        }
        RegionCommands::Publish { name } => {
            let report = client
                .patch(&format!("/tenants/set-tenant-properties-in-redis-by-region-name/{}", name))
                .await?;
            let published = report.get("published").and_then(Value::as_array).map_or(0, Vec::len);
            let failed: Vec<Value> = report
                .get("failed")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if failed.is_empty() {
                return output_success(
                    &output_format,
                    &format!("Republished {} tenants in region {}", published, name),
                    Some(report),
                );
            }

            for failure in &failed {
                let message = format!(
                    "tenant {}: {}",
                    failure.get("tenantId").and_then(Value::as_str).unwrap_or("?"),
                    failure.get("error").and_then(Value::as_str).unwrap_or("unknown error"),
                );
                output_error(&output_format, &message, Some("REPUBLISH_FAILED"))?;
            }
            anyhow::bail!(
                "{} of {} tenants in region {} failed to republish",
                failed.len(),
                published + failed.len(),
                name
            )
        }
    }
}
