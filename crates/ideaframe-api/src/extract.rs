//! Request extractors shared by the handlers.

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Path, Request},
  http::request::Parts,
};
use ideaframe_core::user::User;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated user, placed in the request extensions by whatever
/// authentication layer wraps the router. Missing means 401.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Caller>()
      .cloned()
      .ok_or(ApiError::Unauthorized)
  }
}

/// `axum::Json` whose rejection renders as `INVALID_JSON`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, St> FromRequest<St> for JsonBody<T>
where
  T: DeserializeOwned,
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state).await?;
    Ok(Self(value))
  }
}

/// A `{id}` path segment whose rejection renders as `INVALID_ID`.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

impl<St> FromRequestParts<St> for IdPath
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await?;
    Ok(Self(id))
  }
}
