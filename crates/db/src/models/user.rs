//! User row model and conversion to the core `User`.

use facecheck_core::types::{DbId, EmbeddingVector, Timestamp, User};
use sqlx::types::Json;
use sqlx::FromRow;

/// Full row from the `users` table.
///
/// `vector` is stored as JSONB and decoded straight into the core type.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub username: String,
    pub is_verified: bool,
    pub vector: Option<Json<EmbeddingVector>>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserRow {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            username: row.username,
            is_verified: row.is_verified,
            vector: row.vector.map(|Json(v)| v),
            user_id: Some(row.id),
        }
    }
}
