//! HTTP server for IdeaFrame.
//!
//! Wires the JSON API from `ideaframe-api` to a store, with HTTP Basic
//! authentication, request tracing and file/env configuration.

pub mod auth;

use std::{path::{Path, PathBuf}, sync::Arc, time::Duration};

use axum::{Router, middleware};
use ideaframe_api::ApiState;
use ideaframe_core::{InitiativeService, store::IdeaStore, user::EmailAllowlist};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `IDEAFRAME_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  /// Users whose email appears here are administrators.
  pub admin_emails:         Vec<String>,
  pub request_timeout_secs: u64,
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under the environment.
  /// `IDEAFRAME_ADMIN_EMAILS` is a comma separated list.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "ideaframe.db")?
      .set_default("admin_emails", Vec::<String>::new())?
      .set_default("request_timeout_secs", 10)?
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("IDEAFRAME")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("admin_emails"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application: `/health` in the clear, everything else under
/// `/api/v1` behind Basic auth.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: IdeaStore + 'static,
{
  let admins = Arc::new(EmailAllowlist::new(&config.admin_emails));
  if admins.is_empty() {
    tracing::warn!("no admin emails configured; scores and assignees are read-only");
  }

  let service = InitiativeService::new(Arc::clone(&store), admins);
  let state = ApiState::new(service, config.request_timeout());

  let api = ideaframe_api::api_router(state.clone())
    .layer(middleware::from_fn_with_state(store, auth::require_auth::<S>));

  Router::new()
    .merge(ideaframe_api::health_router(state))
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use ideaframe_core::user::NewUser;
  use ideaframe_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const PASSWORD: &str = "secret";

  fn config() -> ServerConfig {
    ServerConfig {
      host:                 "127.0.0.1".to_string(),
      port:                 0,
      store_path:           PathBuf::from(":memory:"),
      admin_emails:         vec!["ADMIN@example.com".to_string()],
      request_timeout_secs: 5,
    }
  }

  async fn make_app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let hash = auth::hash_password(PASSWORD).unwrap();
    for login in ["admin", "alice"] {
      store
        .add_user(NewUser {
          login:         login.to_string(),
          display_name:  login.to_uppercase(),
          email:         format!("{login}@example.com"),
          password_hash: hash.clone(),
        })
        .await
        .unwrap();
    }
    app(Arc::new(store), &config())
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    app:     &Router,
    method:  &str,
    uri:     &str,
    user:    Option<&str>,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> Response {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
      builder = builder.header(header::AUTHORIZATION, auth_header(user, PASSWORD));
    }
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    app.clone().oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn create(app: &Router, title: &str) -> Value {
    let body = json!({ "title": title }).to_string();
    let resp = send(app, "POST", "/api/v1/initiatives", Some("alice"), vec![], &body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await
  }

  // ── Health & auth ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_credentials() {
    let app = make_app().await;
    let resp = send(&app, "GET", "/health", None, vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
  }

  #[tokio::test]
  async fn api_requires_credentials() {
    let app = make_app().await;

    let resp = send(&app, "GET", "/api/v1/initiatives", None, vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(json_body(resp).await["code"], "UNAUTHORIZED");

    let wrong = auth_header("alice", "nope");
    let resp = send(
      &app,
      "GET",
      "/api/v1/initiatives",
      None,
      vec![(header::AUTHORIZATION, wrong.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn me_reports_admin_flag() {
    let app = make_app().await;

    let body = json_body(send(&app, "GET", "/api/v1/users/me", Some("admin"), vec![], "").await).await;
    assert_eq!(body["login"], "admin");
    assert_eq!(body["isAdmin"], true);

    let body = json_body(send(&app, "GET", "/api/v1/users/me", Some("alice"), vec![], "").await).await;
    assert_eq!(body["isAdmin"], false);
  }

  // ── Initiatives ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_score_as_admin() {
    let app = make_app().await;
    let created = create(&app, "Improve onboarding").await;
    assert_eq!(created["weight"], 0.0);
    assert_eq!(created["upVotes"], 0);
    assert_eq!(created["author"]["login"], "alice");

    let id = created["id"].as_str().unwrap();
    let uri = format!("/api/v1/initiatives/{id}");
    let body = r#"{"value":5,"speed":3,"cost":2}"#;

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![], body).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["code"], "FORBIDDEN");

    let resp = send(&app, "PATCH", &uri, Some("admin"), vec![], body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(header::ETAG));
    assert_eq!(json_body(resp).await["weight"], 3.0);
  }

  #[tokio::test]
  async fn malformed_requests_are_400() {
    let app = make_app().await;
    let created = create(&app, "Strict").await;
    let uri = format!("/api/v1/initiatives/{}", created["id"].as_str().unwrap());

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![], "{not json").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "INVALID_JSON");

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![], r#"{"assigneeId":42}"#).await;
    assert_eq!(json_body(resp).await["code"], "INVALID_JSON");

    let resp = send(&app, "GET", "/api/v1/initiatives/not-a-uuid", Some("alice"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "INVALID_ID");

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![], r#"{"title":""}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"]["title"].is_string());
  }

  #[tokio::test]
  async fn stale_if_match_is_rejected() {
    let app = make_app().await;
    let created = create(&app, "Contended").await;
    let uri = format!("/api/v1/initiatives/{}", created["id"].as_str().unwrap());

    let resp = send(&app, "GET", &uri, Some("alice"), vec![], "").await;
    let etag = resp.headers()[header::ETAG].to_str().unwrap().to_owned();

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![(header::IF_MATCH, etag.as_str())], r#"{"title":"First"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![(header::IF_MATCH, etag.as_str())], r#"{"title":"Second"}"#).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    // Authorization and validation outrank a stale tag.
    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![(header::IF_MATCH, etag.as_str())], r#"{"value":3}"#).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&app, "PATCH", &uri, Some("alice"), vec![(header::IF_MATCH, etag.as_str())], r#"{"title":""}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = json_body(send(&app, "GET", &uri, Some("alice"), vec![], "").await).await;
    assert_eq!(body["title"], "First");
  }

  #[tokio::test]
  async fn votes_and_listing() {
    let app = make_app().await;
    let first = create(&app, "first").await;
    create(&app, "second").await;
    let vote_uri = format!("/api/v1/initiatives/{}/vote", first["id"].as_str().unwrap());

    let resp = send(&app, "POST", &vote_uri, Some("alice"), vec![], r#"{"value":1}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&app, "POST", &vote_uri, Some("admin"), vec![], r#"{"value":-1}"#).await;
    let body = json_body(resp).await;
    assert_eq!((body["upVotes"].as_u64(), body["downVotes"].as_u64()), (Some(1), Some(1)));
    assert_eq!(body["voteScore"], 0);
    assert_eq!(body["currentUserVote"], -1);

    let resp = send(&app, "POST", &vote_uri, Some("alice"), vec![], r#"{"value":3}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, "POST", &vote_uri, Some("admin"), vec![], r#"{"value":0}"#).await;
    let body = json_body(resp).await;
    assert_eq!(body["voteScore"], 1);
    assert_eq!(body["currentUserVote"], 0);

    let resp = send(&app, "GET", "/api/v1/initiatives?sort=votes&limit=1&filter=nonsense", Some("alice"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["title"], "first");
    assert_eq!(page["items"][0]["currentUserVote"], 1);
  }

  #[tokio::test]
  async fn delete_is_admin_only() {
    let app = make_app().await;
    let created = create(&app, "Doomed").await;
    let uri = format!("/api/v1/initiatives/{}", created["id"].as_str().unwrap());

    let resp = send(&app, "DELETE", &uri, Some("alice"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&app, "DELETE", &uri, Some("admin"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&app, "GET", &uri, Some("alice"), vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["code"], "NOT_FOUND");
  }

  // ── Deadlines ──────────────────────────────────────────────────────────────

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn timed_out_creates_leave_no_rows() {
    use ideaframe_api::ApiError;
    use ideaframe_core::{initiative::NewInitiative, query::ListQuery};

    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let author = store
      .add_user(NewUser {
        login:         "racer".into(),
        display_name:  "Racer".into(),
        email:         "racer@example.com".into(),
        password_hash: auth::hash_password(PASSWORD).unwrap(),
      })
      .await
      .unwrap();
    let service = InitiativeService::new(Arc::clone(&store), Arc::new(EmailAllowlist::default()));
    let state = ApiState::new(service, Duration::from_nanos(1));

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..300 {
      let state = state.clone();
      let author = author.clone();
      tasks.spawn(async move {
        let input = NewInitiative { title: format!("race {n}"), description: None };
        state.run(state.service.create(&author, input)).await
      });
    }

    let (mut ok, mut timeouts) = (0u64, 0u64);
    while let Some(joined) = tasks.join_next().await {
      match joined.unwrap() {
        Ok(_) => ok += 1,
        Err(ApiError::Timeout) => timeouts += 1,
        Err(other) => panic!("unexpected error: {other:?}"),
      }
    }
    assert_eq!(ok + timeouts, 300);

    // Give abandoned writes time to reach the database thread.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let (_, committed) = store.list_initiatives(&ListQuery::default(), author.id).await.unwrap();
    assert_eq!(committed, ok);
  }

  #[tokio::test]
  async fn comments_round_trip() {
    let app = make_app().await;
    let created = create(&app, "Talk").await;
    let uri = format!("/api/v1/initiatives/{}/comments", created["id"].as_str().unwrap());

    let resp = send(&app, "POST", &uri, Some("admin"), vec![], r#"{"text":"  looks good "}"#).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(json_body(resp).await["text"], "looks good");

    let page = json_body(send(&app, "GET", &uri, Some("alice"), vec![], "").await).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 50);
    assert_eq!(page["items"][0]["author"]["login"], "admin");
  }
}
