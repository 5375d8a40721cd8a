//! JSON REST API for IdeaFrame.
//!
//! Exposes axum [`Router`]s backed by any [`IdeaStore`]. Authentication is
//! the caller's responsibility: the authenticated user must be placed in the
//! request extensions as an [`extract::Caller`] before these handlers run.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(ideaframe_api::health_router(state.clone()))
//! .nest("/api/v1", ideaframe_api::api_router(state).layer(auth))
//! ```

pub mod comments;
pub mod error;
pub mod etag;
pub mod extract;
pub mod health;
pub mod initiatives;
pub mod users;

use std::{future::Future, pin::pin, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use ideaframe_core::{
  InitiativeService,
  deadline::{self, CommitGate},
  store::IdeaStore,
};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub service:         InitiativeService<S>,
  /// Upper bound on a single handler's work, storage included.
  pub request_timeout: Duration,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), request_timeout: self.request_timeout }
  }
}

impl<S: IdeaStore> ApiState<S> {
  pub fn new(service: InitiativeService<S>, request_timeout: Duration) -> Self {
    Self { service, request_timeout }
  }

  /// Run `fut` under the request deadline.
  ///
  /// The deadline reaches the store through a [`CommitGate`]: once it
  /// expires, a write that has not committed yet rolls back. A write that
  /// won the race has already landed, so the request runs to completion and
  /// reports it.
  pub async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
  where
    F: Future<Output = ideaframe_core::Result<T>>,
  {
    let gate = CommitGate::new();
    let mut fut = pin!(deadline::scope(gate.clone(), fut));

    let outcome = tokio::time::timeout(self.request_timeout, fut.as_mut()).await;
    match outcome {
      Ok(result) => Ok(result?),
      Err(_) if gate.expire() => {
        tracing::warn!(timeout = ?self.request_timeout, "request deadline exceeded");
        Err(ApiError::Timeout)
      }
      Err(_) => {
        tracing::debug!(timeout = ?self.request_timeout, "deadline passed after commit");
        Ok(fut.await?)
      }
    }
  }
}

/// Routes that require an authenticated caller.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: IdeaStore + 'static,
{
  Router::new()
    // Initiatives
    .route(
      "/initiatives",
      get(initiatives::list::<S>).post(initiatives::create::<S>),
    )
    .route(
      "/initiatives/{id}",
      get(initiatives::get_one::<S>)
        .patch(initiatives::update::<S>)
        .delete(initiatives::delete::<S>),
    )
    .route("/initiatives/{id}/vote", post(initiatives::vote::<S>))
    // Comments
    .route(
      "/initiatives/{id}/comments",
      get(comments::list::<S>).post(comments::create::<S>),
    )
    // Users
    .route("/users", get(users::list::<S>))
    .route("/users/me", get(users::me::<S>))
    .with_state(state)
}

/// Unauthenticated liveness route.
pub fn health_router<S>(state: ApiState<S>) -> Router<()>
where
  S: IdeaStore + 'static,
{
  Router::new()
    .route("/health", get(health::handler::<S>))
    .with_state(state)
}
