//! Error types for pathbit

use thiserror::Error;

/// The main error type for pathbit operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathbitError {
    /// A role, user, admin, menu or path identifier does not resolve
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Duplicate role name, username/email/phone, or route
    #[error("conflict: {0}")]
    Conflict(String),

    /// Endpoint or menu pointing at a missing menu. Recovered locally, surfaced as a diagnostic.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// Store-level failure; the enclosing transaction has been aborted
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Cyclic menu hierarchy, or deletion of a record that is still referenced
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("configuration error: {0}")]
    Config(String),
}

impl PathbitError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PathbitError::NotFound { kind, id: id.into() }
    }
}

/// Result type alias for pathbit operations
pub type Result<T> = std::result::Result<T, PathbitError>;

/// Convert a store or codec error into a transaction failure
pub fn err<E: std::error::Error>(e: E) -> PathbitError {
    PathbitError::Transaction(e.to_string())
}
