//! Remote transport abstraction.
//!
//! The execution pipeline and the key manager talk to the relay node only
//! through [`Transport`]. Two implementations exist: [`SshTransport`] for
//! production and [`NoopTransport`], where every call succeeds without
//! touching the network.

mod error;
mod noop;
mod ssh;

use std::fmt;
use std::path::PathBuf;

pub use error::TransportError;
pub use noop::{NoopTransport, TransportCall};
pub use ssh::{HostKeyPolicy, SshTransport};

/// Default SSH port on the relay node.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Dial, open sessions, run commands, close.
///
/// Each session runs at most one command; open a new session per command.
/// All calls block the calling thread for at most the transport's timeout.
pub trait Transport: Send + Sync + 'static {
    type Connection: Send;
    type Session: Send;

    fn dial(&self, target: &DialTarget) -> Result<Self::Connection, TransportError>;

    fn open_session(&self, connection: &Self::Connection) -> Result<Self::Session, TransportError>;

    /// Run `command`, discarding its output. A non-zero exit status is an error.
    fn run(&self, session: &mut Self::Session, command: &str) -> Result<(), TransportError>;

    /// Run `command` and return stdout and stderr interleaved.
    /// A non-zero exit status is an error carrying the output.
    fn combined_output(
        &self,
        session: &mut Self::Session,
        command: &str,
    ) -> Result<Vec<u8>, TransportError>;

    fn close_session(&self, session: Self::Session) -> Result<(), TransportError>;

    fn close_connection(&self, connection: Self::Connection);
}

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct DialTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
}

/// Authentication material for a dial.
#[derive(Clone)]
pub enum Auth {
    /// Path to a PEM private key readable only by the service.
    PrivateKey(PathBuf),
    Password(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
            Self::Password(_) => f.debug_tuple("Password").field(&"[REDACTED]").finish(),
        }
    }
}

/// Quote `s` for a POSIX shell as a single word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_redacted_in_debug() {
        let auth = Auth::Password("hunter2".into());
        let out = format!("{auth:?}");
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }
}
