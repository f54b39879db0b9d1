//! Error types for the rating and claim-coordination service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Closed error taxonomy for rating and claim operations
///
/// The four caller-visible kinds map to fixed handling rules: `Validation`,
/// `NotFound` and `Conflict` abort before any mutation and are surfaced to
/// the caller; `TransientExternal` is logged and swallowed after a commit
/// and never rolls anything back.
#[derive(Debug, thiserror::Error)]
pub enum EloServiceError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Not found: {entity}")]
    NotFound { entity: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("External dispatch failed: {message}")]
    TransientExternal { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl EloServiceError {
    /// Build a validation error from anything displayable
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a conflict error from anything displayable
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Build a not-found error naming the missing entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }
}

/// Inspect an anyhow error for the service taxonomy kind
pub fn error_kind(err: &anyhow::Error) -> Option<&EloServiceError> {
    err.downcast_ref::<EloServiceError>()
}
