//! The produced operations: register, get, list, delete, deliver.
//!
//! HTTP handlers call into [`WebhookService`]; it owns no HTTP knowledge.
//! Blocking work (key generation, transport calls, filesystem copies) runs
//! on the blocking thread pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use qaas_core::{Owner, ValidationError, is_valid_identifier};
use qaas_keys::{AuthorizedKeysTarget, KeyError, add_authorized_key, ensure_key_pair};
use qaas_transport::Transport;
use tracing::info;

use crate::config::{AuthorizedKeysMode, ServerConfig};
use crate::error::QaasError;
use crate::execute::{ExecutionRequest, execute_script};
use crate::storage::{QaasDatabase, WebhookView};

pub struct WebhookService<T: Transport> {
    db: QaasDatabase,
    transport: Arc<T>,
    config: Arc<ServerConfig>,
    /// Serializes credential provisioning per owner.
    key_locks: Arc<Mutex<HashMap<Owner, Arc<Mutex<()>>>>>,
}

impl<T: Transport> Clone for WebhookService<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            key_locks: Arc::clone(&self.key_locks),
        }
    }
}

fn check_identifier(identifier: &str) -> Result<(), QaasError> {
    if is_valid_identifier(identifier) {
        Ok(())
    } else {
        Err(ValidationError::Identifier(identifier.to_string()).into())
    }
}

impl<T: Transport> WebhookService<T> {
    pub fn new(db: QaasDatabase, transport: T, config: ServerConfig) -> Self {
        Self {
            db,
            transport: Arc::new(transport),
            config: Arc::new(config),
            key_locks: Arc::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register `identifier` for `owner` and return its callback URL.
    ///
    /// Provisions the owner's key pair and authorizes it before the row is
    /// inserted, so a registered webhook always has a usable credential.
    pub async fn register_webhook(
        &self,
        identifier: &str,
        owner: &Owner,
        description: &str,
    ) -> Result<String, QaasError> {
        check_identifier(identifier)?;
        self.provision_credentials(owner).await?;

        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.db
            .add_entry(identifier, owner, description, &created)
            .await?;

        info!(identifier, %owner, "Webhook registered");
        Ok(self.config.callback.url_for(identifier))
    }

    pub async fn get_webhook(&self, identifier: &str) -> Result<WebhookView, QaasError> {
        let entry = self.db.get_entry_by_identifier(identifier).await?;
        Ok(entry.into_view(&self.config.callback))
    }

    pub async fn list_webhooks(&self, owner: &Owner) -> Result<Vec<WebhookView>, QaasError> {
        Ok(self
            .db
            .list_entries_for_owner(owner, &self.config.callback)
            .await?)
    }

    pub async fn delete_webhook(&self, identifier: &str, owner: &Owner) -> Result<(), QaasError> {
        self.db.delete_entry(identifier, owner).await?;
        info!(identifier, %owner, "Webhook deleted");
        Ok(())
    }

    /// Run the execution pipeline for a delivery to `identifier`.
    ///
    /// Returns the job submission output.
    pub async fn deliver_webhook(
        &self,
        identifier: &str,
        payload: Vec<u8>,
    ) -> Result<String, QaasError> {
        check_identifier(identifier)?;
        let entry = self.db.get_entry_by_identifier(identifier).await?;
        let owner = Owner::new(entry.groupname, entry.username)?;

        info!(identifier, %owner, bytes = payload.len(), "Webhook delivery");
        let request = ExecutionRequest::new(&self.config, identifier, owner, payload);
        let transport = Arc::clone(&self.transport);
        tokio::task::spawn_blocking(move || execute_script(transport.as_ref(), &request)).await?
    }

    fn owner_lock(&self, owner: &Owner) -> Arc<Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner.clone()).or_default())
    }

    /// Make sure `owner` has a key pair and that its public half is
    /// authorized on the owner's account.
    ///
    /// Concurrent calls for one owner run one at a time, so the pair that
    /// gets authorized is the pair left on disk.
    async fn provision_credentials(&self, owner: &Owner) -> Result<(), QaasError> {
        let transport = Arc::clone(&self.transport);
        let config = Arc::clone(&self.config);
        let lock = self.owner_lock(owner);
        let owner = owner.clone();

        tokio::task::spawn_blocking(move || -> Result<(), KeyError> {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let paths = config.key_paths(&owner);
            let comment = format!("qaas-{}-{}", owner.group(), owner.user());
            if ensure_key_pair(&paths, config.key_bits, &comment)? {
                info!(%owner, "Generated key pair");
            }

            let target = match config.authorized_keys {
                AuthorizedKeysMode::Local => AuthorizedKeysTarget::Local {
                    home_dir: &config.home_dir,
                },
                AuthorizedKeysMode::Remote => AuthorizedKeysTarget::Remote {
                    transport: transport.as_ref(),
                    target: config
                        .relay
                        .dial_target(owner.user(), paths.private_key.clone()),
                },
            };
            add_authorized_key(target, &owner, &paths.public_key)
        })
        .await??;
        Ok(())
    }
}
