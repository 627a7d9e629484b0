//! Shared data model: messages, face representations, and user records.

use serde::{Deserialize, Serialize};

/// User identifiers are assigned by storage. Postgres uses BIGINT identity.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A verification request delivered by the queue or the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub path: String,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Embedding vector
// ---------------------------------------------------------------------------

/// Pixel-space box around a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacialArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One detected face as reported by the embedding routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRepresentation {
    pub embedding: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facial_area: Option<FacialArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_confidence: Option<f64>,
}

/// Ordered list of face representations for a single image.
///
/// The core treats it as opaque beyond "non-empty on success"; it is
/// serialized transparently as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(pub Vec<FaceRepresentation>);

impl EmbeddingVector {
    pub fn new(faces: Vec<FaceRepresentation>) -> Self {
        Self(faces)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn faces(&self) -> &[FaceRepresentation] {
        &self.0
    }
}

impl From<Vec<FaceRepresentation>> for EmbeddingVector {
    fn from(faces: Vec<FaceRepresentation>) -> Self {
        Self(faces)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A verified user as returned by [`Storage`](crate::storage::Storage).
///
/// `username` is the natural key. `user_id` is assigned by storage on
/// creation and preserved across updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<EmbeddingVector>,
    #[serde(default)]
    pub user_id: Option<DbId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_vector_parses_routine_output() {
        let raw = r#"[
            {"embedding": [0.1, -0.2, 0.3], "facial_area": {"x": 1, "y": 2, "w": 30, "h": 40}, "face_confidence": 0.98},
            {"embedding": [0.5]}
        ]"#;

        let vector: EmbeddingVector = serde_json::from_str(raw).expect("valid representation");

        assert_eq!(vector.len(), 2);
        assert_eq!(vector.faces()[0].embedding, vec![0.1, -0.2, 0.3]);
        assert_eq!(
            vector.faces()[0].facial_area,
            Some(FacialArea { x: 1, y: 2, w: 30, h: 40 })
        );
        assert!(vector.faces()[1].facial_area.is_none());
        assert!(vector.faces()[1].face_confidence.is_none());
    }

    #[test]
    fn user_without_vector_omits_field() {
        let user = User {
            username: "george".into(),
            is_verified: true,
            vector: None,
            user_id: Some(0),
        };

        let json = serde_json::to_value(&user).expect("serializable");
        assert!(json.get("vector").is_none());
        assert_eq!(json["user_id"], 0);
    }
}
