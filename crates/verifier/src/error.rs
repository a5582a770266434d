//! Verifier error types

use graphfetch_orm::ModelError;
use thiserror::Error;

/// Result alias for verifier operations
pub type VerifierResult<T> = Result<T, VerifierError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifierError {
    /// The fixed dataset could not be written; nothing was committed
    #[error("Dataset setup failed: {0}")]
    SetupFailure(ModelError),

    #[error(transparent)]
    Orm(#[from] ModelError),

    /// An association's load state differs from what the plan requires
    #[error("Load state mismatch at '{path}': expected loaded={expected}, found loaded={actual}")]
    Mismatch {
        path: String,
        expected: bool,
        actual: bool,
    },
}

impl VerifierError {
    /// The underlying persistence error, if any
    pub fn model_error(&self) -> Option<&ModelError> {
        match self {
            VerifierError::SetupFailure(err) | VerifierError::Orm(err) => Some(err),
            VerifierError::Mismatch { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.model_error().map_or(false, ModelError::is_not_found)
    }

    pub fn is_invalid_plan(&self) -> bool {
        self.model_error().map_or(false, ModelError::is_invalid_plan)
    }
}
