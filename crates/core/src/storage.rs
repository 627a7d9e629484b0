//! Durable user storage seam and the in-memory reference implementation.
//!
//! [`Storage::update_user`] is an upsert keyed by username. `Ok(None)` is the
//! backend's way of saying "nothing was written" (e.g. the record is marked
//! deleted); the caller treats it as a storage failure.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::types::{DbId, EmbeddingVector, User};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store could not complete the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Create-or-update persistence for verified users.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Mark `username` verified with `vector` attached.
    ///
    /// Creates the user (fresh id, `is_verified = true`) when absent;
    /// otherwise replaces the vector and keeps the existing id.
    async fn update_user(
        &self,
        vector: EmbeddingVector,
        username: &str,
    ) -> Result<Option<User>, StorageError>;
}

// ---------------------------------------------------------------------------
// InMemoryStorage
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Users {
    rows: Vec<User>,
    next_id: DbId,
}

/// Process-local storage. Data lives only as long as the process.
///
/// Identifiers start at 0 and increase by one per created user. Usernames
/// are matched exactly (case-sensitive).
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    users: Mutex<Users>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user by exact username.
    pub async fn get_user(&self, username: &str) -> Option<User> {
        let users = self.users.lock().await;
        let found = users.rows.iter().find(|u| u.username == username).cloned();
        if found.is_none() {
            tracing::debug!(username, "User is not found");
        }
        found
    }

    /// Snapshot of every stored user in creation order.
    pub async fn users(&self) -> Vec<User> {
        self.users.lock().await.rows.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.rows.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn update_user(
        &self,
        vector: EmbeddingVector,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        let mut users = self.users.lock().await;

        if let Some(existing) = users.rows.iter_mut().find(|u| u.username == username) {
            existing.is_verified = true;
            existing.vector = Some(vector);
            tracing::info!(username, user_id = ?existing.user_id, "Updated user");
            return Ok(Some(existing.clone()));
        }

        let user = User {
            username: username.to_string(),
            is_verified: true,
            vector: Some(vector),
            user_id: Some(users.next_id),
        };
        users.next_id += 1;
        users.rows.push(user.clone());
        tracing::info!(username, user_id = ?user.user_id, "Created user");
        Ok(Some(user))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
