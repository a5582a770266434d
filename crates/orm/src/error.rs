//! Error types for the persistence engine
//!
//! Covers lookups, fetch plan validation, load-state access, query parsing
//! and unit-of-work failures.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// No entity of the given type exists with the given id
    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: i64 },

    /// A single-result query matched nothing
    #[error("No result: {0}")]
    NoResult(String),

    /// A fetch plan or join path names an association the entity does not declare
    #[error("Invalid fetch plan: {0}")]
    InvalidPlan(String),

    /// A deferred association was read as if it had been materialized
    #[error("Not loaded: {0}")]
    NotLoaded(String),

    /// A single-result query produced more than one distinct entity
    #[error("Query returned {count} distinct results where one was expected")]
    NonUniqueResult { count: usize },

    /// Query text could not be parsed or bound
    #[error("Query error: {0}")]
    Query(String),

    /// Unit of work failed to commit or was used after completion
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Entity state violates a storage constraint
    #[error("Validation error: {0}")]
    Validation(String),

    /// Schema or engine configuration is inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A unit of work was begun while another is active on the same session
    #[error("Session error: {0}")]
    Session(String),
}

impl ModelError {
    /// Shorthand for a missing entity
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        ModelError::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Returns true if this error reports a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. } | ModelError::NoResult(_))
    }

    /// Returns true if this error reports an invalid fetch plan
    pub fn is_invalid_plan(&self) -> bool {
        matches!(self, ModelError::InvalidPlan(_))
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

/// Error types for relationship operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationshipError {
    /// Relationship not declared on the model
    #[error("Relationship not found: {0}")]
    NotFound(String),
    /// Invalid relationship configuration
    #[error("Invalid relationship configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<RelationshipError> for ModelError {
    fn from(err: RelationshipError) -> Self {
        match err {
            RelationshipError::NotFound(msg) => ModelError::InvalidPlan(msg),
            RelationshipError::InvalidConfiguration(msg) => ModelError::Configuration(msg),
        }
    }
}
