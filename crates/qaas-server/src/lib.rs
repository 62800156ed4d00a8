//! `QaaS` server library.
//!
//! Webhook registry, execution pipeline, and the HTTP layer in front of
//! them. The binary in `main.rs` wires these together from flags.

pub mod config;
pub mod error;
pub mod execute;
pub mod routes;
pub mod service;
pub mod storage;

pub use config::{AuthorizedKeysMode, RelayConfig, ServerConfig};
pub use error::{Missing, QaasError};
pub use service::WebhookService;
