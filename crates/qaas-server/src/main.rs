//! `QaaS` server
//!
//! Accepts webhook deliveries and turns each into a job submission on the
//! cluster's relay node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use qaas_core::CallbackBase;
use qaas_core::tracing_init::init_tracing;
use qaas_server::routes::build_router;
use qaas_server::storage::QaasDatabase;
use qaas_server::{AuthorizedKeysMode, RelayConfig, ServerConfig, WebhookService};
use qaas_transport::{HostKeyPolicy, NoopTransport, SshTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Ssh,
    /// Run the pipeline without touching the network.
    Noop,
}

#[derive(Parser, Debug)]
#[command(name = "qaas-server")]
#[command(version, about = "QaaS server - webhook to HPC job submission bridge")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "QAAS_ADDR", default_value = "0.0.0.0:5111")]
    addr: SocketAddr,

    /// Path to SQLite database file. Defaults to `<data-dir>/qaas.db`.
    #[arg(long, env = "QAAS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Service data directory (key pairs and staged credentials).
    #[arg(long, env = "QAAS_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Users' home directories, mounted locally as `<home>/<group>/<user>`.
    #[arg(long, env = "QAAS_HOME_DIR")]
    home_dir: PathBuf,

    /// Home directories as seen from the relay node. Defaults to `--home-dir`.
    #[arg(long, env = "QAAS_REMOTE_HOME_DIR")]
    remote_home_dir: Option<PathBuf>,

    /// Host name in callback URLs.
    #[arg(long, env = "QAAS_PUBLIC_HOST", default_value = "localhost")]
    public_host: String,

    /// Port in callback URLs.
    #[arg(long, env = "QAAS_EXTERNAL_PORT", default_value_t = 443)]
    external_port: u16,

    /// Scheme in callback URLs.
    #[arg(long, env = "QAAS_PUBLIC_SCHEME", default_value = "https")]
    public_scheme: String,

    /// Relay node running the job submission command.
    #[arg(long, env = "QAAS_RELAY_HOST")]
    relay_host: String,

    #[arg(long, env = "QAAS_RELAY_PORT", default_value_t = qaas_transport::DEFAULT_SSH_PORT)]
    relay_port: u16,

    /// Authenticate on the relay node with a password instead of the
    /// owner's key.
    #[arg(long, env = "QAAS_RELAY_PASSWORD", hide_env_values = true)]
    relay_password: Option<String>,

    /// OpenSSH known_hosts file used to verify the relay node.
    #[arg(long, env = "QAAS_KNOWN_HOSTS", conflicts_with = "insecure_accept_any_host_key")]
    known_hosts: Option<PathBuf>,

    /// Accept any relay host key. Test rigs only.
    #[arg(long)]
    insecure_accept_any_host_key: bool,

    /// Timeout for each SSH operation, in seconds. Zero is rejected since
    /// the SSH layer reads it as "wait forever".
    #[arg(
        long,
        env = "QAAS_SSH_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    ssh_timeout_secs: u64,

    /// Cluster job submission command.
    #[arg(long, env = "QAAS_SUBMIT_COMMAND", default_value = "qsub")]
    submit_command: String,

    /// Where to install new public keys.
    #[arg(long, env = "QAAS_AUTHORIZED_KEYS", value_enum, default_value_t = AuthorizedKeysMode::Local)]
    authorized_keys: AuthorizedKeysMode,

    #[arg(long, env = "QAAS_TRANSPORT", value_enum, default_value_t = TransportKind::Ssh)]
    transport: TransportKind,

    /// RSA modulus size for generated keys.
    #[arg(long, env = "QAAS_KEY_BITS", default_value_t = qaas_keys::RSA_KEY_BITS)]
    key_bits: usize,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    /// Default log level when `RUST_LOG` is unset.
    #[arg(long, env = "QAAS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut relay = RelayConfig::new(self.relay_host.clone());
        relay.port = self.relay_port;
        relay.password.clone_from(&self.relay_password);

        let mut config = ServerConfig::new(
            CallbackBase::new(
                self.public_scheme.clone(),
                self.public_host.clone(),
                self.external_port,
            ),
            self.data_dir.clone(),
            self.home_dir.clone(),
            relay,
        );
        if let Some(remote) = &self.remote_home_dir {
            config.remote_home_dir.clone_from(remote);
        }
        config.submit_command.clone_from(&self.submit_command);
        config.authorized_keys = self.authorized_keys;
        config.key_bits = self.key_bits;
        config
    }

    fn host_key_policy(&self) -> anyhow::Result<HostKeyPolicy> {
        match (&self.known_hosts, self.insecure_accept_any_host_key) {
            (Some(path), false) => Ok(HostKeyPolicy::KnownHosts(path.clone())),
            (None, true) => Ok(HostKeyPolicy::InsecureAcceptAny),
            _ => anyhow::bail!(
                "relay host key policy required: pass --known-hosts <file> or --insecure-accept-any-host-key"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = &args.log_level;
    init_tracing(
        &format!(
            "qaas_server={level},qaas_core={level},qaas_keys={level},qaas_transport={level}"
        ),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting qaas-server"
    );

    let config = args.server_config();
    if config.authorized_keys == AuthorizedKeysMode::Remote && config.relay.password.is_none() {
        warn!("Remote authorized_keys without a relay password only works for already authorized owners");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.data_dir.join("qaas.db"));
    info!(path = %db_path.display(), "Opening registry database");
    let db = QaasDatabase::open(&db_path).await?;

    match args.transport {
        TransportKind::Ssh => {
            let transport = SshTransport::new(
                args.host_key_policy()?,
                Duration::from_secs(args.ssh_timeout_secs),
            );
            serve(args.addr, WebhookService::new(db, transport, config)).await
        }
        TransportKind::Noop => {
            warn!("Dry run: no-op transport, no job will be submitted");
            serve(args.addr, WebhookService::new(db, NoopTransport::new(), config)).await
        }
    }
}

async fn serve<T: Transport>(addr: SocketAddr, service: WebhookService<T>) -> anyhow::Result<()> {
    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
