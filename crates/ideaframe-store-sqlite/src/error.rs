//! Error type for `ideaframe-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value outside its domain.
  #[error("invalid stored value: {0}")]
  InvalidValue(String),

  #[error("login already taken: {0}")]
  LoginTaken(String),

  /// The request deadline expired before the write could commit; nothing
  /// was written.
  #[error("request deadline expired before commit")]
  DeadlineExpired,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
