//! The module contains the errors the engine can throw.
//!
//! The taxonomy matters to callers:
//!
//! - [`Validation`] and [`State`] are caller bugs, surfaced immediately and
//!   never retried.
//! - [`Conflict`] is transient lock/serialization contention; the engine
//!   retries it a bounded number of times before surfacing it, and callers
//!   may retry again (see [`EngineError::is_retryable`]).
//! - [`Integrity`] means someone tried to delete or rewrite an immutable
//!   record. It is always logged before being returned.
//!
//! [`Validation`]: EngineError::Validation
//! [`State`]: EngineError::State
//! [`Conflict`]: EngineError::Conflict
//! [`Integrity`]: EngineError::Integrity
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("illegal state transition: {0}")]
    State(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("concurrency conflict: {0}")]
    Conflict(String),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for errors a caller may safely retry (lock contention,
    /// serialization failures). Everything else is permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::State(a), Self::State(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Integrity(a), Self::Integrity(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
