//! Error taxonomy for core operations.
//!
//! Validation errors are raised synchronously before any write is
//! attempted; store errors surface as failures of the specific operation
//! that issued the write and never roll back earlier steps.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during tracker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced group/task/user document is absent.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Password mismatch, or a non-owner attempting an owner-only
    /// operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input rejected before any write was attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// A `NotFound` for the given entity kind and identifier.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// A `Forbidden` with the given reason.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// A `Validation` with the given reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Whether retrying the same operation could succeed (store errors
    /// are transient; the rest are caller mistakes).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
