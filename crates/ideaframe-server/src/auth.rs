//! HTTP Basic authentication against the user table.
//!
//! Passwords are stored as argon2 PHC strings. A successful check inserts the
//! resolved user into the request extensions as a [`Caller`].

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use ideaframe_api::{ApiError, extract::Caller};
use ideaframe_core::{store::IdeaStore, user::User};
use rand_core::OsRng;

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// `false` for a wrong password and for a malformed stored hash alike.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Decode `Authorization: Basic …` into `(login, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (login, password) = creds.split_once(':')?;
  Some((login.to_owned(), password.to_owned()))
}

/// Resolve the user behind the request's Basic credentials.
pub async fn authenticate<S>(headers: &HeaderMap, store: &S) -> Result<User, ApiError>
where
  S: IdeaStore,
{
  let (login, password) = basic_credentials(headers).ok_or(ApiError::Unauthorized)?;

  let creds = store
    .find_credentials(&login)
    .await
    .map_err(|e| ApiError::Core(ideaframe_core::Error::store(e)))?;

  match creds {
    Some(creds) if verify_password(&password, &creds.password_hash) => Ok(creds.user),
    _ => {
      tracing::debug!(%login, "authentication failed");
      Err(ApiError::Unauthorized)
    }
  }
}

/// axum middleware guarding every authenticated route.
pub async fn require_auth<S>(
  State(store): State<Arc<S>>,
  mut req: Request,
  next: Next,
) -> Response
where
  S: IdeaStore + 'static,
{
  match authenticate(req.headers(), store.as_ref()).await {
    Ok(user) => {
      req.extensions_mut().insert(Caller(user));
      next.run(req).await
    }
    Err(ApiError::Unauthorized) => {
      let mut res = ApiError::Unauthorized.into_response();
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"ideaframe\""),
      );
      res
    }
    Err(e) => e.into_response(),
  }
}
