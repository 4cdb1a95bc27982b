//! HTTP endpoint handlers. These are thin wrappers that forward to the pipeline and store.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument, warn};

use crate::error::{GenerationError, StoreError};
use crate::protocol::*;
use crate::state::AppState;

/// Handler failure with the status it maps to.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.0, Json(ErrorOut { error: self.1 })).into_response()
  }
}

impl From<GenerationError> for ApiError {
  fn from(e: GenerationError) -> Self {
    let status = match &e {
      GenerationError::UnknownDimension(_) => StatusCode::NOT_FOUND,
      GenerationError::InvalidLevel(_) => StatusCode::BAD_REQUEST,
      GenerationError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
      GenerationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
      GenerationError::EmptyResponse { .. }
      | GenerationError::Extract(_)
      | GenerationError::Schema { .. }
      | GenerationError::Client(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError(status, e.to_string())
  }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation_enabled: state.orchestrator.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_dimensions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(DimensionsOut { dimensions: state.dimensions.clone() })
}

#[instrument(level = "info", skip(state, body), fields(dimension = %body.dimension_id, level = body.level))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Result<Json<GenerateOut>, ApiError> {
  let Some(result) = state.generate(&body.dimension_id, body.level, body.validate).await else {
    warn!(target: "thinkgen", "Generate requested but no backend is configured");
    return Err(ApiError(StatusCode::SERVICE_UNAVAILABLE, "generation backend not configured".into()));
  };
  let (outcome, record) = result.map_err(|e| {
    error!(target: "thinkgen", error = %e, "HTTP generate failed");
    ApiError::from(e)
  })?;
  info!(target: "thinkgen", id = %record.id, success = outcome.success, attempts = outcome.attempts, "HTTP generate finished");
  Ok(Json(GenerateOut::new(&outcome, &record)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_content(State(state): State<Arc<AppState>>) -> Result<Json<ContentListOut>, ApiError> {
  let items: Vec<ContentSummary> = state.store.list().await?.iter().map(ContentSummary::from).collect();
  info!(target: "thinkgen", count = items.len(), "HTTP content listed");
  Ok(Json(ContentListOut { items }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_content(
  State(state): State<Arc<AppState>>,
  Path((dimension, level)): Path<(String, u8)>,
) -> Result<impl IntoResponse, ApiError> {
  if !state.dimensions.iter().any(|d| d.id == dimension) {
    return Err(GenerationError::UnknownDimension(dimension).into());
  }
  if !(1..=5).contains(&level) {
    return Err(GenerationError::InvalidLevel(level).into());
  }
  let version = state.config.content_version;
  match state.store.get(&dimension, level, version).await? {
    Some(record) => Ok(Json(record)),
    None => Err(ApiError(StatusCode::NOT_FOUND, format!("no content stored for {dimension}/L{level} v{version}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{to_bytes, Body};
  use axum::http::Request;
  use serde_json::Value;
  use tower::ServiceExt;

  use crate::config::PipelineConfig;
  use crate::fixtures::{self, Scripted};
  use crate::openai::GenerationClient;
  use crate::orchestrator::CancelSignal;
  use crate::routes::build_router;
  use crate::store::{ContentStore, MemoryStore};

  fn app(client: Option<Arc<dyn GenerationClient>>) -> (axum::Router, Arc<MemoryStore>) {
    let mut cfg = PipelineConfig::default();
    cfg.models_per_unit = 2;
    cfg.retry.max_retries = 1;
    cfg.call.max_attempts = 1;
    let store = Arc::new(MemoryStore::default());
    let state = AppState::new(Arc::new(cfg), client, store.clone(), CancelSignal::never()).expect("state");
    (build_router(Arc::new(state)), store)
  }

  async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  #[tokio::test]
  async fn health_and_dimensions() {
    let (router, _) = app(None);
    let (status, body) = call(router.clone(), get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["generationEnabled"], false);

    let (status, body) = call(router, get("/api/v1/dimensions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimensions"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["dimensions"][0]["levels"][2]["title"], "Analysing Arguments");
  }

  #[tokio::test]
  async fn generate_without_backend_is_unavailable() {
    let (router, _) = app(None);
    let (status, body) = call(router, post_json("/api/v1/generate", r#"{"dimensionId":"critical","level":1}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("not configured")));
  }

  #[tokio::test]
  async fn generate_persists_and_content_is_served() {
    let client: Arc<dyn GenerationClient> = Arc::new(Scripted::new(fixtures::good_attempt_replies()));
    let (router, store) = app(Some(client));

    let (status, body) = call(router.clone(), post_json("/api/v1/generate", r#"{"dimensionId":"systems","level":2}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["validationStatus"], "validated");
    assert_eq!(body["attempts"], 1);
    assert!(store.get("systems", 2, 1).await.unwrap().is_some());

    let (status, body) = call(router.clone(), get("/api/v1/content/systems/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["estimatedTime"], 25);
    assert_eq!(body["tags"][0], "Systems Thinking");

    let (status, _) = call(router.clone(), get("/api/v1/content/systems/3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(router, get("/api/v1/content")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["items"][0]["dimensionId"], "systems");
    assert_eq!(body["items"][0]["qualityScore"], 100);
  }

  #[tokio::test]
  async fn bad_requests_map_to_client_errors() {
    let client: Arc<dyn GenerationClient> = Arc::new(Scripted::new(Vec::new()));
    let (router, _) = app(Some(client));

    let (status, _) = call(router.clone(), post_json("/api/v1/generate", r#"{"dimensionId":"telepathy","level":1}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(router.clone(), post_json("/api/v1/generate", r#"{"dimensionId":"critical","level":9}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(router.clone(), get("/api/v1/content/critical/0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // Script is empty: every stage gets an empty reply.
    let (status, body) = call(router, post_json("/api/v1/generate", r#"{"dimensionId":"critical","level":1}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("empty response")));
  }
}
