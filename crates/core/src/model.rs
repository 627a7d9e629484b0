//! Supported face-recognition models.
//!
//! The set is closed: supporting another model means adding a variant here,
//! never matching arbitrary strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Face-recognition models the embedding routine may be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelName {
    #[default]
    Facenet,
}

impl ModelName {
    /// Every supported model, in declaration order.
    pub const ALL: &'static [ModelName] = &[ModelName::Facenet];

    /// Name understood by the embedding routine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facenet => "Facenet",
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is not one of [`ModelName::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model {0} isn't supported")]
pub struct UnsupportedModel(pub String);

impl FromStr for ModelName {
    type Err = UnsupportedModel;

    /// Exact, case-sensitive match against the routine's model names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| UnsupportedModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_name() {
        assert_eq!("Facenet".parse::<ModelName>(), Ok(ModelName::Facenet));
    }

    #[test]
    fn rejects_unknown_and_differently_cased_names() {
        for name in ["VGG-Face", "facenet", "", "Facenet512"] {
            assert_eq!(
                name.parse::<ModelName>(),
                Err(UnsupportedModel(name.to_string())),
                "{name:?} must be rejected"
            );
        }
    }

    #[test]
    fn default_is_facenet() {
        assert_eq!(ModelName::default(), ModelName::Facenet);
        assert_eq!(ModelName::default().to_string(), "Facenet");
    }

    #[test]
    fn serializes_as_routine_name() {
        let json = serde_json::to_string(&ModelName::Facenet).expect("serializable");
        assert_eq!(json, "\"Facenet\"");
    }
}
