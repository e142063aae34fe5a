//! Error types for control-plane calls.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type PlaneResult<T> = Result<T, PlaneError>;

/// Errors returned by a control plane or by the convergence helpers.
#[derive(Debug, Error)]
pub enum PlaneError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{operation}: at most {limit} identifiers per call, got {requested}")]
    BatchTooLarge {
        operation: &'static str,
        limit: usize,
        requested: usize,
    },

    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("gave up waiting for {what} after {attempts} attempts")]
    WaitExhausted { what: String, attempts: u32 },

    #[error("run cancelled")]
    Cancelled,
}

impl PlaneError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
