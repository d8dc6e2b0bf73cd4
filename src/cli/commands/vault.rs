use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::vault::{CredentialVault, EncryptedSecret};

#[derive(Subcommand)]
pub enum VaultCommands {
    #[command(about = "Seal a plaintext credential")]
    Encrypt {
        #[arg(help = "Plaintext to seal")]
        plaintext: String,
    },

    #[command(about = "Open a sealed credential")]
    Decrypt {
        #[arg(long, help = "Hex initialization vector")]
        iv: String,
        #[arg(long, help = "Hex ciphertext")]
        content: String,
    },

    #[command(about = "Generate a random password and its sealed form")]
    Password,
}

fn local_vault() -> anyhow::Result<CredentialVault> {
    let secret = std::env::var("VAULT_SECRET_KEY").context("VAULT_SECRET_KEY is not set")?;
    Ok(CredentialVault::from_secret(&secret)?)
}

pub fn handle(cmd: VaultCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let vault = local_vault()?;

    match cmd {
        VaultCommands::Encrypt { plaintext } => {
            let sealed = vault.encrypt(&plaintext)?;
            match output_format {
                OutputFormat::Json => output_success(&output_format, "Sealed", Some(json!(sealed))),
                OutputFormat::Text => {
                    println!("iv:      {}", sealed.iv);
                    println!("content: {}", sealed.content.unwrap_or_default());
                    Ok(())
                }
            }
        }
        VaultCommands::Decrypt { iv, content } => {
            let plaintext = vault.decrypt(&EncryptedSecret {
                iv,
                content: Some(content),
            })?;
            match output_format {
                OutputFormat::Json => output_success(&output_format, "Opened", Some(json!({ "plaintext": plaintext }))),
                OutputFormat::Text => {
                    println!("{}", plaintext);
                    Ok(())
                }
            }
        }
        VaultCommands::Password => {
            let password = vault.generate_password();
            let sealed = vault.encrypt(&password)?;
            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Generated",
                    Some(json!({ "password": password, "secret": sealed })),
                ),
                OutputFormat::Text => {
                    println!("password: {}", password);
                    println!("iv:       {}", sealed.iv);
                    println!("content:  {}", sealed.content.unwrap_or_default());
                    Ok(())
                }
            }
        }
    }
}
