//! Key manager error types.

use std::path::PathBuf;

use qaas_transport::TransportError;

/// Errors from generating, storing, or installing key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Key encoding failed: {0}")]
    Encoding(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Public key file {} is empty", .0.display())]
    EmptyPublicKey(PathBuf),

    #[error("Remote authorized_keys update failed: {0}")]
    Transport(#[from] TransportError),
}

impl KeyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
