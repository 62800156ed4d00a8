//! SSH transport over TCP, backed by libssh2.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use ssh2::{CheckResult, ExtendedData, KnownHostFileKind};
use tracing::{debug, warn};

use crate::{Auth, DialTarget, Transport, TransportError};

/// How the relay node's host key is verified.
///
/// There is no default: deployments must choose one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept only keys listed for the host in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
    /// Accept any host key. Only for test rigs.
    InsecureAcceptAny,
}

/// Production transport.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SshTransport {
    host_key_policy: HostKeyPolicy,
    timeout: Duration,
}

impl SshTransport {
    /// `timeout` bounds the TCP connect and every blocking libssh2 call.
    /// A zero timeout is raised to one millisecond: libssh2 reads zero as
    /// no timeout at all.
    pub const fn new(host_key_policy: HostKeyPolicy, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            MIN_TIMEOUT
        } else {
            timeout
        };
        Self {
            host_key_policy,
            timeout,
        }
    }

    fn connect_tcp(&self, target: &DialTarget) -> Result<TcpStream, TransportError> {
        let endpoint = format!("{}:{}", target.host, target.port);
        let addrs = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Dial {
                target: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let mut last_error = String::from("no addresses resolved");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "TCP connect attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(TransportError::Dial {
            target: endpoint,
            reason: last_error,
        })
    }

    fn verify_host_key(
        &self,
        session: &ssh2::Session,
        target: &DialTarget,
    ) -> Result<(), TransportError> {
        let reject = |reason: &str| TransportError::HostKey {
            host: target.host.clone(),
            reason: reason.to_string(),
        };

        match &self.host_key_policy {
            HostKeyPolicy::InsecureAcceptAny => {
                warn!(host = %target.host, "Host key verification disabled");
                Ok(())
            }
            HostKeyPolicy::KnownHosts(path) => {
                let (key, _) = session
                    .host_key()
                    .ok_or_else(|| reject("server sent no host key"))?;
                let mut known_hosts = session.known_hosts()?;
                known_hosts
                    .read_file(path, KnownHostFileKind::OpenSSH)
                    .map_err(|e| reject(&format!("cannot read {}: {e}", path.display())))?;

                match known_hosts.check_port(&target.host, target.port, key) {
                    CheckResult::Match => Ok(()),
                    CheckResult::NotFound => Err(reject("host not listed in known_hosts")),
                    CheckResult::Mismatch => Err(reject("key does not match known_hosts entry")),
                    CheckResult::Failure => Err(reject("known_hosts check failed")),
                }
            }
        }
    }

    fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Transport for SshTransport {
    type Connection = ssh2::Session;
    type Session = ssh2::Channel;

    fn dial(&self, target: &DialTarget) -> Result<ssh2::Session, TransportError> {
        let tcp = self.connect_tcp(target)?;

        let mut session = ssh2::Session::new()?;
        session.set_timeout(self.timeout_millis());
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| TransportError::Dial {
            target: format!("{}:{}", target.host, target.port),
            reason: format!("handshake failed: {e}"),
        })?;

        self.verify_host_key(&session, target)?;

        let auth_result = match &target.auth {
            Auth::PrivateKey(path) => {
                session.userauth_pubkey_file(&target.username, None, path, None)
            }
            Auth::Password(password) => session.userauth_password(&target.username, password),
        };
        let auth_failed = |reason: String| TransportError::Auth {
            user: target.username.clone(),
            host: target.host.clone(),
            reason,
        };
        auth_result.map_err(|e| auth_failed(e.to_string()))?;
        if !session.authenticated() {
            return Err(auth_failed("server did not accept credentials".into()));
        }

        debug!(host = %target.host, user = %target.username, "SSH connection established");
        Ok(session)
    }

    fn open_session(&self, connection: &ssh2::Session) -> Result<ssh2::Channel, TransportError> {
        Ok(connection.channel_session()?)
    }

    fn run(&self, session: &mut ssh2::Channel, command: &str) -> Result<(), TransportError> {
        session.exec(command)?;
        let output = drain(session)?;
        check_exit(session, command, &output)
    }

    fn combined_output(
        &self,
        session: &mut ssh2::Channel,
        command: &str,
    ) -> Result<Vec<u8>, TransportError> {
        session.handle_extended_data(ExtendedData::Merge)?;
        session.exec(command)?;
        let output = drain(session)?;
        check_exit(session, command, &output)?;
        Ok(output)
    }

    fn close_session(&self, mut session: ssh2::Channel) -> Result<(), TransportError> {
        session.close()?;
        session.wait_close()?;
        Ok(())
    }

    fn close_connection(&self, connection: ssh2::Session) {
        if let Err(e) = connection.disconnect(None, "qaas: done", None) {
            debug!(error = %e, "SSH disconnect failed");
        }
    }
}

/// Read the channel to EOF so the remote command can finish.
fn drain(channel: &mut ssh2::Channel) -> Result<Vec<u8>, TransportError> {
    let mut output = Vec::new();
    channel
        .read_to_end(&mut output)
        .map_err(|e| TransportError::Session(format!("reading command output: {e}")))?;
    channel.wait_close()?;
    Ok(output)
}

fn check_exit(
    channel: &ssh2::Channel,
    command: &str,
    output: &[u8],
) -> Result<(), TransportError> {
    let status = channel.exit_status()?;
    if status == 0 {
        Ok(())
    } else {
        Err(TransportError::CommandFailed {
            command: command.to_string(),
            status,
            output: String::from_utf8_lossy(output).trim().to_string(),
        })
    }
}
