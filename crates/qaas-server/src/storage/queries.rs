//! Registry queries.
//!
//! Every mutation runs in its own transaction; dropping the transaction on
//! an error path rolls it back.

use qaas_core::db::DatabaseError;
use qaas_core::{CallbackBase, Owner, ValidationError, is_valid_identifier};
use tracing::{debug, error};

use super::db::QaasDatabase;
use super::models::{WebhookEntry, WebhookView};

/// Registry failures, one variant per outcome a caller acts on.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("webhook '{0}' not found")]
    NotFound(String),

    #[error("registry integrity violation: {count} rows for webhook '{identifier}'")]
    Integrity { identifier: String, count: usize },

    #[error("webhook '{0}' already registered")]
    Duplicate(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.into())
    }
}

fn check_identifier(hash: &str) -> Result<(), RegistryError> {
    if is_valid_identifier(hash) {
        Ok(())
    } else {
        Err(ValidationError::Identifier(hash.to_string()).into())
    }
}

impl QaasDatabase {
    /// Insert a webhook row. Fails with `Duplicate` if the identifier exists.
    pub async fn add_entry(
        &self,
        hash: &str,
        owner: &Owner,
        description: &str,
        created: &str,
    ) -> Result<(), RegistryError> {
        check_identifier(hash)?;

        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "INSERT INTO webhooks (hash, groupname, username, description, created) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hash)
        .bind(owner.group())
        .bind(owner.user())
        .bind(description)
        .bind(created)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::UniqueViolation(_) => RegistryError::Duplicate(hash.to_string()),
            other => other.into(),
        })?;
        tx.commit().await?;

        debug!(hash, %owner, "Webhook row inserted");
        Ok(())
    }

    /// Delete the row matching both identifier and owner.
    pub async fn delete_entry(&self, hash: &str, owner: &Owner) -> Result<(), RegistryError> {
        check_identifier(hash)?;

        let mut tx = self.pool().begin().await?;
        let result =
            sqlx::query("DELETE FROM webhooks WHERE hash = ? AND groupname = ? AND username = ?")
                .bind(hash)
                .bind(owner.group())
                .bind(owner.user())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(hash.to_string()));
        }
        tx.commit().await?;

        debug!(hash, %owner, "Webhook row deleted");
        Ok(())
    }

    /// Look up a webhook by identifier. More than one row is an integrity error.
    pub async fn get_entry_by_identifier(&self, hash: &str) -> Result<WebhookEntry, RegistryError> {
        check_identifier(hash)?;

        let mut rows = sqlx::query_as::<_, WebhookEntry>("SELECT * FROM webhooks WHERE hash = ?")
            .bind(hash)
            .fetch_all(self.pool())
            .await?;

        match rows.len() {
            0 => Err(RegistryError::NotFound(hash.to_string())),
            1 => Ok(rows.remove(0)),
            count => {
                error!(hash, count, "registry integrity violation");
                Err(RegistryError::Integrity {
                    identifier: hash.to_string(),
                    count,
                })
            }
        }
    }

    /// All webhooks of `owner`, oldest first, with callback URLs.
    pub async fn list_entries_for_owner(
        &self,
        owner: &Owner,
        base: &CallbackBase,
    ) -> Result<Vec<WebhookView>, RegistryError> {
        let rows = sqlx::query_as::<_, WebhookEntry>(
            "SELECT * FROM webhooks WHERE groupname = ? AND username = ? ORDER BY id",
        )
        .bind(owner.group())
        .bind(owner.user())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|row| row.into_view(base)).collect())
    }
}
