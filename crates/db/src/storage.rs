//! Postgres-backed [`Storage`] adapter.

use async_trait::async_trait;
use facecheck_core::storage::{Storage, StorageError};
use facecheck_core::types::{EmbeddingVector, User};

use crate::repositories::UserRepo;
use crate::DbPool;

/// Durable user storage on top of [`UserRepo`].
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: DbPool,
}

impl PgStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn update_user(
        &self,
        vector: EmbeddingVector,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        let row = UserRepo::upsert_verified(&self.pool, username, &vector)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                tracing::info!(username, user_id = row.id, "User is_verified set to true");
                Ok(Some(User::from(row)))
            }
            None => {
                tracing::error!(username, "User is marked deleted, not updated");
                Ok(None)
            }
        }
    }
}
