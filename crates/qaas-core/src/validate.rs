//! Identifier and URL path validation.
//!
//! All checks are anchored regular expressions over the full input: no
//! trimming, no case folding, no trailing slash tolerance.

use std::sync::LazyLock;

use regex::Regex;

use crate::{CONFIGURATION_PATH, WEBHOOK_PATH};

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{UUID_PATTERN}$")).expect("static regex is valid")
});

static WEBHOOK_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{WEBHOOK_PATH}/{UUID_PATTERN}$")).expect("static regex is valid")
});

static CONFIG_COLLECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{CONFIGURATION_PATH}$")).expect("static regex is valid")
});

static CONFIG_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{CONFIGURATION_PATH}/{UUID_PATTERN}$")).expect("static regex is valid")
});

static ACCOUNT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[A-Za-z_][A-Za-z0-9_.-]{0,31}$").expect("static regex is valid")
});

/// CRUD verbs of the configuration resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOperation {
    Add,
    List,
    Info,
    Delete,
}

/// True iff `s` is a canonical lowercase hyphenated UUID.
pub fn is_valid_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

/// True iff `path` is exactly `/webhook/<uuid>`.
pub fn is_valid_webhook_path(path: &str) -> bool {
    WEBHOOK_PATH_RE.is_match(path)
}

/// True iff `path` has the configuration resource shape for `operation`:
/// the bare prefix for add/list, `<prefix>/<uuid>` for info/delete.
pub fn is_valid_config_path(path: &str, operation: ConfigOperation) -> bool {
    match operation {
        ConfigOperation::Add | ConfigOperation::List => CONFIG_COLLECTION_RE.is_match(path),
        ConfigOperation::Info | ConfigOperation::Delete => CONFIG_ITEM_RE.is_match(path),
    }
}

/// True iff `name` can be used as a Unix group or user name.
///
/// Owner names become path segments under the home and key directories.
pub fn is_valid_account_name(name: &str) -> bool {
    name != "." && name != ".." && ACCOUNT_NAME_RE.is_match(name)
}

/// Extract the trailing identifier of a `<prefix>/<uuid>` path.
///
/// Returns `None` unless the path passes the matching validator.
pub fn identifier_from_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|id| is_valid_identifier(id))
}
