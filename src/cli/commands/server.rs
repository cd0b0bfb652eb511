use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health from the /health endpoint")]
    Ping {
        #[arg(long, help = "Server base URL", default_value = "http://127.0.0.1:3000")]
        url: String,
    },

    #[command(about = "Show server information from the API root endpoint")]
    Info {
        #[arg(long, help = "Server base URL", default_value = "http://127.0.0.1:3000")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Ping { url } => {
            let endpoint = format!("{}/health", url.trim_end_matches('/'));
            let response = reqwest::get(&endpoint)
                .await
                .with_context(|| format!("failed to reach {}", endpoint))?;
            let status = response.status();
            let body: Value = response.json().await.context("invalid health response")?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    let db = body["data"]["database"].as_str().unwrap_or("unknown");
                    println!("{} ({}): database {}", endpoint, status, db);
                }
            }
            if !status.is_success() {
                anyhow::bail!("server reported unhealthy status: {}", status);
            }
            Ok(())
        }
        ServerCommands::Info { url } => {
            let endpoint = format!("{}/", url.trim_end_matches('/'));
            let response = reqwest::get(&endpoint)
                .await
                .with_context(|| format!("failed to reach {}", endpoint))?;
            let body: Value = response.json().await.context("invalid info response")?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Text => {
                    let name = body["data"]["name"].as_str().unwrap_or("unknown");
                    let version = body["data"]["version"].as_str().unwrap_or("unknown");
                    println!("{} v{}", name, version);
                }
            }
            Ok(())
        }
    }
}
