//! `QaaS` CLI
//!
//! Manage your webhooks on a `QaaS` server. The owner of every request is
//! the invoking Unix user and their primary group.

mod client;
mod owner;
mod webhook_cmd;

use std::path::PathBuf;

use clap::Parser;

use qaas_core::tracing_init::init_tracing;

use crate::client::ApiClient;
use crate::webhook_cmd::WebhookAction;

#[derive(Parser, Debug)]
#[command(name = "qaas")]
#[command(version, about = "Webhooks that submit jobs to the cluster", long_about = None)]
struct Cli {
    /// Server base URL (scheme and host).
    #[arg(long, env = "QAAS_SERVER", default_value = "https://localhost")]
    server: String,

    /// Server port.
    #[arg(long, env = "QAAS_PORT", default_value_t = 5111)]
    port: u16,

    /// Extra CA certificate (PEM) to trust, for self-signed servers.
    #[arg(long, env = "QAAS_CA_CERT")]
    ca_cert: Option<PathBuf>,

    #[command(subcommand)]
    action: WebhookAction,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("qaas_cli=warn", false);

    let client = ApiClient::new(&cli.server, cli.port, cli.ca_cert.as_deref())?;
    let owner = owner::current_owner()?;
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;

    webhook_cmd::run(cli.action, &client, &owner, &home).await
}
