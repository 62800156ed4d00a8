//! `QaaS` Core Library
//!
//! Shared functionality for `QaaS` components:
//! - Webhook identifier and URL path validation
//! - Owner (group + user) and callback URL types
//! - `SQLite` pool helpers
//! - Tracing initialisation

pub mod db;
pub mod error;
pub mod owner;
pub mod tracing_init;
pub mod validate;

pub use error::ValidationError;
pub use owner::{CallbackBase, Owner};
pub use validate::{
    ConfigOperation, identifier_from_path, is_valid_account_name, is_valid_config_path,
    is_valid_identifier, is_valid_webhook_path,
};

/// Path prefix under which webhook deliveries are accepted.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Path prefix of the webhook configuration resource.
pub const CONFIGURATION_PATH: &str = "/configuration";

/// Name of the per-user directory holding webhook workspaces.
pub const WORKSPACE_DIR: &str = ".qaas";

/// File inside a workspace that points at the user's script.
pub const SCRIPT_POINTER_NAME: &str = "script.sh";

/// File inside a workspace that receives the delivered payload.
pub const PAYLOAD_NAME: &str = "payload";
