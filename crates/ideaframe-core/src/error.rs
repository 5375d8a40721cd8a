//! Error types for `ideaframe-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or out-of-range input, always scoped to one payload field.
  #[error("validation error on field '{field}': {message}")]
  Validation {
    field:   &'static str,
    message: String,
  },

  #[error("initiative not found: {0}")]
  InitiativeNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  /// Authenticated, but not allowed to perform the attempted mutation.
  #[error("forbidden")]
  Forbidden,

  #[error("conflict: {0}")]
  Conflict(String),

  /// The caller's expectation about the current state no longer holds.
  #[error("precondition failed")]
  PreconditionFailed,

  /// Storage or transport failure; never the caller's fault.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation { field, message: message.into() }
  }

  /// Wrap a storage backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// Stable machine-readable code surfaced to API clients.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Validation { .. } => "VALIDATION_ERROR",
      Self::InitiativeNotFound(_) | Self::UserNotFound(_) => "NOT_FOUND",
      Self::Forbidden => "FORBIDDEN",
      Self::Conflict(_) => "CONFLICT",
      Self::PreconditionFailed => "PRECONDITION_FAILED",
      Self::Store(_) => "INTERNAL_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
