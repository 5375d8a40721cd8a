//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"code": ..., "message": ..., "details"?: ...}`.
//! Storage failures are logged in full and surfaced with a generic message.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ideaframe_core::Error as CoreError;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("invalid json: {0}")]
  InvalidJson(String),

  #[error("invalid id: {0}")]
  InvalidId(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("request timed out")]
  Timeout,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::Core(e) => match e {
        CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        CoreError::InitiativeNotFound(_) | CoreError::UserNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Forbidden => StatusCode::FORBIDDEN,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      Self::InvalidJson(_) | Self::InvalidId(_) => StatusCode::BAD_REQUEST,
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      Self::Core(e) => e.code(),
      Self::InvalidJson(_) => "INVALID_JSON",
      Self::InvalidId(_) => "INVALID_ID",
      Self::Unauthorized => "UNAUTHORIZED",
      Self::Timeout => "TIMEOUT",
    }
  }

  fn message_and_details(&self) -> (String, Option<Value>) {
    match self {
      Self::Core(CoreError::Validation { field, message }) => {
        let mut details = Map::new();
        details.insert((*field).to_owned(), Value::String(message.clone()));
        (format!("{field} {message}"), Some(Value::Object(details)))
      }
      Self::Core(CoreError::InitiativeNotFound(_)) => ("Initiative not found".into(), None),
      Self::Core(CoreError::UserNotFound(_)) => ("User not found".into(), None),
      Self::Core(CoreError::Forbidden) => {
        ("Only administrators may change this field".into(), None)
      }
      Self::Core(CoreError::Conflict(m)) => (m.clone(), None),
      Self::Core(CoreError::PreconditionFailed) => {
        ("Initiative was modified concurrently".into(), None)
      }
      Self::Core(CoreError::Store(_)) => ("Internal server error".into(), None),
      Self::InvalidJson(_) => ("Invalid JSON in request body".into(), None),
      Self::InvalidId(_) => ("Invalid identifier".into(), None),
      Self::Unauthorized => ("Authorization required".into(), None),
      Self::Timeout => ("Request timed out".into(), None),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, code = self.code(), "request failed");
    } else {
      tracing::debug!(error = %self, code = self.code(), "request rejected");
    }

    let (message, details) = self.message_and_details();
    let mut body = json!({ "code": self.code(), "message": message });
    if let Some(details) = details {
      body["details"] = details;
    }
    (status, Json(body)).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::InvalidJson(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::InvalidId(rejection.body_text()) }
}
