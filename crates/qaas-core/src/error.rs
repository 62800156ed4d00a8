//! Validation error kind shared by every `QaaS` component.

use thiserror::Error;

/// A request was malformed. Always the caller's fault; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid webhook id '{0}'")]
    Identifier(String),

    #[error("invalid URL path '{0}'")]
    Path(String),

    #[error("invalid method '{0}'")]
    Method(String),

    #[error("invalid configuration request: {0} missing")]
    MissingField(&'static str),

    #[error("invalid configuration request: invalid {field} '{value}'")]
    AccountName { field: &'static str, value: String },

    #[error("invalid JSON body: {0}")]
    Body(String),
}
