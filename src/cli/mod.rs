// cli/mod.rs - tenantctl command-line interface
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "tenantctl")]
#[command(about = "tenantctl - operator interface for the tenant provisioner")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "TENANTCTL_URL",
        default_value = DEFAULT_URL,
        help = "Base URL of the provisioner API"
    )]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Seal and open credentials locally (uses VAULT_SECRET_KEY)")]
    Vault {
        #[command(subcommand)]
        cmd: commands::vault::VaultCommands,
    },

    #[command(about = "Onboard, offboard and republish tenants")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Region listing and bulk republish")]
    Region {
        #[command(subcommand)]
        cmd: commands::region::RegionCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Vault { cmd } => commands::vault::handle(cmd, output_format),
        Commands::Tenant { cmd } => {
            let client = utils::ApiClient::new(&cli.url)?;
            commands::tenant::handle(cmd, &client, output_format).await
        }
        Commands::Region { cmd } => {
            let client = utils::ApiClient::new(&cli.url)?;
            commands::region::handle(cmd, &client, output_format).await
        }
    }
}
