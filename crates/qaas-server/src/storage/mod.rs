//! `SQLite` storage for the webhook registry.

mod db;
mod models;
mod queries;

#[cfg(test)]
mod tests;

pub use db::QaasDatabase;
pub use models::{WebhookEntry, WebhookView};
pub use queries::RegistryError;
