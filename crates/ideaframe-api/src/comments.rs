//! Handlers for `/initiatives/:id/comments`.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use ideaframe_core::{
  comment::{Comment, NewComment},
  query::{DEFAULT_COMMENT_LIMIT, Paginated},
  store::IdeaStore,
};
use serde::Deserialize;

use crate::{
  ApiState,
  error::ApiError,
  extract::{Caller, IdPath, JsonBody},
  initiatives::parse_page,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<String>,
  pub offset: Option<String>,
}

/// `GET /initiatives/:id/comments`, oldest first.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Caller(_actor): Caller,
  IdPath(id): IdPath,
  Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Comment>>, ApiError>
where
  S: IdeaStore + 'static,
{
  let page = parse_page(params.limit, params.offset, DEFAULT_COMMENT_LIMIT);
  let comments = state.run(state.service.list_comments(id, page)).await?;
  Ok(Json(comments))
}

/// `POST /initiatives/:id/comments`: body `{"text":"…"}`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<NewComment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IdeaStore + 'static,
{
  let comment = state.run(state.service.add_comment(&actor, id, body)).await?;
  Ok((StatusCode::CREATED, Json(comment)))
}
