//! Precondition checks run before any work is scheduled.

use std::path::Path;

use crate::error::CoreError;
use crate::model::ModelName;

/// Validates request inputs for the verification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Fail with `InvalidInput` unless `path` names an existing regular file.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::error!(path = %path.display(), "File doesn't exist");
            return Err(CoreError::InvalidInput(format!(
                "file {} doesn't exist",
                path.display()
            )));
        }
        Ok(())
    }

    /// Fail with `InvalidInput` unless `name` is a supported [`ModelName`].
    pub fn validate_model_name(&self, name: &str) -> Result<ModelName, CoreError> {
        name.parse::<ModelName>().map_err(|e| {
            tracing::error!(model_name = name, "Model isn't supported");
            CoreError::InvalidInput(e.to_string())
        })
    }
}
