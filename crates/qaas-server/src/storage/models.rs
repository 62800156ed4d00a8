//! Registry rows and their outward representation.

use qaas_core::CallbackBase;
use serde::Serialize;

/// One row of the `webhooks` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WebhookEntry {
    pub id: i64,
    pub hash: String,
    pub groupname: String,
    pub username: String,
    pub description: String,
    pub created: String,
}

/// A registry row with its callback URL, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookView {
    pub hash: String,
    pub groupname: String,
    pub username: String,
    pub description: String,
    pub created: String,
    pub url: String,
}

impl WebhookEntry {
    /// Attach the callback URL. The URL is derived, never stored.
    pub fn into_view(self, base: &CallbackBase) -> WebhookView {
        let url = base.url_for(&self.hash);
        WebhookView {
            hash: self.hash,
            groupname: self.groupname,
            username: self.username,
            description: self.description,
            created: self.created,
            url,
        }
    }
}
