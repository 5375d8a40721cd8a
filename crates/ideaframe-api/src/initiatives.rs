//! Handlers for `/initiatives` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/initiatives` | `?filter=all\|mineCreated\|assignedToMe&sort=weight\|votes&limit&offset` |
//! | `POST`   | `/initiatives` | Body: `{"title":"…","description":"…"}` |
//! | `GET`    | `/initiatives/:id` | 404 if missing or deleted; sets `ETag` |
//! | `PATCH`  | `/initiatives/:id` | Partial update; optional `If-Match` |
//! | `DELETE` | `/initiatives/:id` | Admin only, soft delete |
//! | `POST`   | `/initiatives/:id/vote` | Body: `{"value":-1\|0\|1}` |

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use ideaframe_core::{
  initiative::{Initiative, NewInitiative, UpdateInitiative},
  query::{
    DEFAULT_INITIATIVE_LIMIT, ListFilter, ListQuery, ListSort, Page, Paginated,
  },
  store::IdeaStore,
  vote::VoteRequest,
};
use serde::Deserialize;

use crate::{
  ApiState,
  error::ApiError,
  etag::{compute_etag, if_match_accepts},
  extract::{Caller, IdPath, JsonBody},
};

// ─── List ────────────────────────────────────────────────────────────────────

/// Raw query parameters. Numbers are taken as strings so that garbage falls
/// back to the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub filter: Option<String>,
  pub sort:   Option<String>,
  pub limit:  Option<String>,
  pub offset: Option<String>,
}

impl ListParams {
  pub fn into_query(self) -> ListQuery {
    ListQuery {
      filter: ListFilter::from_param(self.filter.as_deref()),
      sort:   ListSort::from_param(self.sort.as_deref()),
      page:   parse_page(self.limit, self.offset, DEFAULT_INITIATIVE_LIMIT),
    }
  }
}

pub(crate) fn parse_page(limit: Option<String>, offset: Option<String>, default_limit: u32) -> Page {
  let number = |raw: Option<String>| raw.and_then(|s| s.trim().parse::<i64>().ok());
  Page::new(number(limit), number(offset), default_limit)
}

/// `GET /initiatives`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Initiative>>, ApiError>
where
  S: IdeaStore + 'static,
{
  let query = params.into_query();
  let page = state.run(state.service.list(&actor, query)).await?;
  Ok(Json(page))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /initiatives`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  JsonBody(body): JsonBody<NewInitiative>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IdeaStore + 'static,
{
  let created = state.run(state.service.create(&actor, body)).await?;
  let etag = compute_etag(&created);
  Ok((StatusCode::CREATED, [(header::ETAG, etag)], Json(created)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /initiatives/:id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  IdPath(id): IdPath,
) -> Result<impl IntoResponse, ApiError>
where
  S: IdeaStore + 'static,
{
  let initiative = state.run(state.service.get(&actor, id)).await?;
  let etag = compute_etag(&initiative);
  Ok(([(header::ETAG, etag)], Json(initiative)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /initiatives/:id`
///
/// Last writer wins unless the client sends `If-Match`. The precondition is
/// checked against the state loaded by the update itself, after
/// authorization and validation, and is not atomic with the write.
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  IdPath(id): IdPath,
  headers: HeaderMap,
  JsonBody(body): JsonBody<UpdateInitiative>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IdeaStore + 'static,
{
  let if_match = headers
    .get(header::IF_MATCH)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);

  let updated = state
    .run(state.service.update_if(&actor, id, body, |current| {
      if_match
        .as_deref()
        .is_none_or(|expected| if_match_accepts(expected, &compute_etag(current)))
    }))
    .await?;

  let etag = compute_etag(&updated);
  Ok(([(header::ETAG, etag)], Json(updated)))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /initiatives/:id`
pub async fn delete<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  IdPath(id): IdPath,
) -> Result<StatusCode, ApiError>
where
  S: IdeaStore + 'static,
{
  state.run(state.service.soft_delete(&actor, id)).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Vote ────────────────────────────────────────────────────────────────────

/// `POST /initiatives/:id/vote`
pub async fn vote<S>(
  State(state): State<ApiState<S>>,
  Caller(actor): Caller,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<VoteRequest>,
) -> Result<Json<Initiative>, ApiError>
where
  S: IdeaStore + 'static,
{
  let initiative = state.run(state.service.cast_vote(&actor, id, body)).await?;
  Ok(Json(initiative))
}
