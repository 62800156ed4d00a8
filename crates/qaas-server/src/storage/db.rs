//! `SQLite` database for the `QaaS` server.

use std::path::Path;

use qaas_core::db::{DatabaseError, open_pool, open_pool_in_memory};
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Explicitly passed registry handle. Cloning shares the pool.
#[derive(Clone)]
pub struct QaasDatabase {
    pool: Pool<Sqlite>,
}

impl QaasDatabase {
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let db = Self {
            pool: open_pool(path).await?,
        };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Self {
            pool: open_pool_in_memory().await?,
        };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Registry migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
