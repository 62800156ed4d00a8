//! Webhook owners and callback URL construction.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::validate::is_valid_account_name;
use crate::{WEBHOOK_PATH, WORKSPACE_DIR};

/// The (group, user) pair a webhook belongs to.
///
/// Construction validates both names, so any `Owner` can be used safely as
/// path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    group: String,
    user: String,
}

impl Owner {
    pub fn new(group: impl Into<String>, user: impl Into<String>) -> Result<Self, ValidationError> {
        let group = group.into();
        let user = user.into();
        if user.is_empty() {
            return Err(ValidationError::MissingField("username"));
        }
        if group.is_empty() {
            return Err(ValidationError::MissingField("groupname"));
        }
        if !is_valid_account_name(&user) {
            return Err(ValidationError::AccountName {
                field: "username",
                value: user,
            });
        }
        if !is_valid_account_name(&group) {
            return Err(ValidationError::AccountName {
                field: "groupname",
                value: group,
            });
        }
        Ok(Self { group, user })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// `<base>/<group>/<user>`
    pub fn dir_in(&self, base: &Path) -> PathBuf {
        base.join(&self.group).join(&self.user)
    }

    /// `<home>/<group>/<user>/.qaas/<identifier>`
    pub fn workspace_in(&self, home: &Path, identifier: &str) -> PathBuf {
        self.dir_in(home).join(WORKSPACE_DIR).join(identifier)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.user)
    }
}

/// Externally visible address of the service, used to derive callback URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackBase {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl CallbackBase {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// `scheme://host:port/webhook/<identifier>`
    pub fn url_for(&self, identifier: &str) -> String {
        format!(
            "{}://{}:{}{WEBHOOK_PATH}/{identifier}",
            self.scheme, self.host, self.port
        )
    }
}
