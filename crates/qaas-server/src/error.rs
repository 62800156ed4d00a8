//! Error taxonomy of the webhook pipeline.
//!
//! Every failure reaching a produced operation's caller is one of these
//! kinds. Mapping kinds to HTTP status codes is the router's job.

use std::path::PathBuf;

use qaas_core::ValidationError;
use qaas_core::db::DatabaseError;
use qaas_keys::KeyError;
use qaas_transport::TransportError;

use crate::storage::RegistryError;

/// What was not found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Missing {
    #[error("webhook '{0}' not found")]
    Webhook(String),

    #[error("script pointer {} not found", .0.display())]
    ScriptPointer(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum QaasError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] Missing),

    #[error("registry integrity violation: {count} rows for webhook '{identifier}'")]
    Integrity { identifier: String, count: usize },

    #[error("webhook '{0}' already registered")]
    Conflict(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("credential error: {0}")]
    Credential(#[from] KeyError),

    #[error("workspace error on {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QaasError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    /// The caller sent something unusable; never worth retrying.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

impl From<RegistryError> for QaasError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Invalid(v) => Self::Validation(v),
            RegistryError::NotFound(id) => Self::NotFound(Missing::Webhook(id)),
            RegistryError::Integrity { identifier, count } => {
                Self::Integrity { identifier, count }
            }
            RegistryError::Duplicate(id) => Self::Conflict(id),
            RegistryError::Database(e) => Self::Database(e),
        }
    }
}

impl From<tokio::task::JoinError> for QaasError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_keep_their_kind() {
        assert!(matches!(
            QaasError::from(RegistryError::NotFound("x".into())),
            QaasError::NotFound(Missing::Webhook(_))
        ));
        assert!(matches!(
            QaasError::from(RegistryError::Duplicate("x".into())),
            QaasError::Conflict(_)
        ));
        assert!(matches!(
            QaasError::from(RegistryError::Integrity {
                identifier: "x".into(),
                count: 3
            }),
            QaasError::Integrity { count: 3, .. }
        ));
        assert!(matches!(
            QaasError::from(RegistryError::Invalid(ValidationError::Identifier("x".into()))),
            QaasError::Validation(_)
        ));
    }

    #[test]
    fn client_errors() {
        assert!(QaasError::from(ValidationError::Path("/x".into())).is_client_error());
        assert!(QaasError::from(Missing::Webhook("x".into())).is_client_error());
        assert!(!QaasError::Conflict("x".into()).is_client_error());
        assert!(!QaasError::Internal("x".into()).is_client_error());
    }
}
