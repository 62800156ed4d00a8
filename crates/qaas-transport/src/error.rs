//! Transport error types.

/// Errors from dialing the relay node or running remote commands.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to dial {target}: {reason}")]
    Dial { target: String, reason: String },

    #[error("host key of {host} rejected: {reason}")]
    HostKey { host: String, reason: String },

    #[error("authentication as {user}@{host} failed: {reason}")]
    Auth {
        user: String,
        host: String,
        reason: String,
    },

    #[error("session error: {0}")]
    Session(String),

    #[error("remote command `{command}` exited with status {status}: {output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },
}

impl From<ssh2::Error> for TransportError {
    fn from(e: ssh2::Error) -> Self {
        Self::Session(e.to_string())
    }
}
