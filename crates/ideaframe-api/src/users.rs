//! Handlers for `/users`.

use axum::{Json, extract::State};
use ideaframe_core::{
  store::IdeaStore,
  user::{Profile, UserSummary},
};

use crate::{ApiState, error::ApiError, extract::Caller};

/// `GET /users`: display-safe summaries, e.g. for an assignee picker.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Caller(_actor): Caller,
) -> Result<Json<Vec<UserSummary>>, ApiError>
where
  S: IdeaStore + 'static,
{
  let users = state.run(state.service.list_users()).await?;
  Ok(Json(users))
}

/// `GET /users/me`
pub async fn me<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
) -> Json<Profile>
where
  S: IdeaStore + 'static,
{
  Json(state.service.profile(&actor))
}
