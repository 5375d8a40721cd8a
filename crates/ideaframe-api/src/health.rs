//! `GET /health`: a store round trip under the request deadline.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use chrono::{SecondsFormat, Utc};
use ideaframe_core::store::IdeaStore;
use serde::Serialize;

use crate::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
  pub status:    &'static str,
  pub database:  &'static str,
  pub timestamp: String,
}

pub async fn handler<S>(State(state): State<ApiState<S>>) -> (StatusCode, Json<HealthResponse>)
where
  S: IdeaStore + 'static,
{
  let ping = tokio::time::timeout(state.request_timeout, state.service.store().ping()).await;

  let (status, body_status, database) = match ping {
    Ok(Ok(())) => (StatusCode::OK, "ok", "connected"),
    Ok(Err(e)) => {
      tracing::error!(error = %e, "database health check failed");
      (StatusCode::SERVICE_UNAVAILABLE, "error", "disconnected")
    }
    Err(_) => {
      tracing::error!("database health check timed out");
      (StatusCode::SERVICE_UNAVAILABLE, "error", "disconnected")
    }
  };

  (status, Json(HealthResponse {
    status: body_status,
    database,
    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
  }))
}
