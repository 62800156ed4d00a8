//! Typed server configuration.
//!
//! Built once by the binary from command-line flags and shared read-only by
//! every request.

use std::fmt;
use std::path::PathBuf;

use qaas_core::{CallbackBase, Owner};
use qaas_keys::{KeyPairPaths, RSA_KEY_BITS};
use qaas_transport::{Auth, DEFAULT_SSH_PORT, DialTarget};

/// How a newly generated public key reaches the owner's `authorized_keys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthorizedKeysMode {
    /// Append through the locally mounted home directories.
    #[default]
    Local,
    /// Append over the transport, logged in to the relay node as the owner.
    Remote,
}

/// The relay node every remote command runs on.
#[derive(Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Password authentication instead of the owner's staged key.
    pub password: Option<String>,
}

impl RelayConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            password: None,
        }
    }

    /// Dial `username` on the relay, with the password if one is configured
    /// and the given key otherwise.
    pub fn dial_target(&self, username: &str, private_key: PathBuf) -> DialTarget {
        let auth = self
            .password
            .as_ref()
            .map_or(Auth::PrivateKey(private_key), |p| Auth::Password(p.clone()));
        DialTarget {
            host: self.host.clone(),
            port: self.port,
            username: username.to_string(),
            auth,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub callback: CallbackBase,
    /// Service-private state: `keys/` and `staging/`.
    pub data_dir: PathBuf,
    /// Users' home directories as mounted on this host.
    pub home_dir: PathBuf,
    /// The same directories as seen from the relay node.
    pub remote_home_dir: PathBuf,
    pub relay: RelayConfig,
    pub submit_command: String,
    pub authorized_keys: AuthorizedKeysMode,
    pub key_bits: usize,
}

impl ServerConfig {
    pub fn new(
        callback: CallbackBase,
        data_dir: PathBuf,
        home_dir: PathBuf,
        relay: RelayConfig,
    ) -> Self {
        Self {
            callback,
            data_dir,
            remote_home_dir: home_dir.clone(),
            home_dir,
            relay,
            submit_command: "qsub".to_string(),
            authorized_keys: AuthorizedKeysMode::Local,
            key_bits: RSA_KEY_BITS,
        }
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn key_paths(&self, owner: &Owner) -> KeyPairPaths {
        KeyPairPaths::for_owner(&self.keys_dir(), owner)
    }
}
