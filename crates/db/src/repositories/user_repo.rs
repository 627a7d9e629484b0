//! Repository for the `users` table.

use facecheck_core::types::{DbId, EmbeddingVector};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::user::UserRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, is_verified, vector, deleted_at, created_at, updated_at";

/// Provides upsert and lookup operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Create or update `username` as verified with `vector` attached.
    ///
    /// A new user gets the next identity value. An existing user keeps its
    /// id and has its vector replaced. Returns `None` when the existing row
    /// is soft-deleted: the conflict update is skipped and nothing is written.
    pub async fn upsert_verified(
        pool: &PgPool,
        username: &str,
        vector: &EmbeddingVector,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, is_verified, vector)
             VALUES ($1, true, $2)
             ON CONFLICT (username) DO UPDATE SET
                is_verified = true,
                vector = EXCLUDED.vector,
                updated_at = NOW()
             WHERE users.deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .bind(Json(vector))
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive), including soft-deleted rows.
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by id, including soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a user deleted. Returns `true` if a live row was updated.
    pub async fn soft_delete(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
