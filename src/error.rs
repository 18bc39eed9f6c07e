//! Error types for association and persistence operations.
//!
//! Configuration problems are reported when the [`Registry`](crate::Registry) is
//! built. Validation failures are accumulated on each record's
//! [`Errors`](crate::Errors) and only surface here when a save is aborted.

use thiserror::Error;

/// Result type alias for lifeline operations
pub type Result<T> = std::result::Result<T, OrmError>;

/// Error type for lifeline operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrmError {
    /// Incompatible or incomplete model/association declarations
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation needs a persisted owner with a stable primary key
    #[error("Cannot {operation} on {model}->{name} because model is not loaded")]
    NotLoaded {
        model: String,
        name: String,
        operation: &'static str,
    },

    /// No meta registered under this model name
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The model has no association with this name (or of the requested kind)
    #[error("Unknown association {model}->{name}")]
    UnknownAssociation { model: String, name: String },

    /// A lookup by key matched no row
    #[error("Record not found: {model} with key {key}")]
    NotFound { model: String, key: String },

    /// Top-level validation failed, carrying the rendered messages
    #[error("Validation failed for {model}: {message}")]
    Validation { model: String, message: String },

    /// The query cannot be evaluated by the store
    #[error("Query error: {0}")]
    Query(String),

    /// The underlying store failed
    #[error("Store error: {0}")]
    Store(String),
}

impl OrmError {
    /// Shorthand for configuration errors raised while building the registry
    pub fn configuration(message: impl Into<String>) -> Self {
        OrmError::Configuration(message.into())
    }

    /// True for errors raised at registry initialization time
    pub fn is_configuration(&self) -> bool {
        matches!(self, OrmError::Configuration(_) | OrmError::NotLoaded { .. })
    }
}
