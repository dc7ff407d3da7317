use axum::{
    extract::{Query, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::aggregate::{AggregatedResult, Aggregator, LatencyProbe};
use crate::auth::{require_caller, Caller, SharedAuthorizer};
use crate::error::AggregatorError;
use crate::registry::RegistryHandle;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub registry: RegistryHandle,
    pub auth: SharedAuthorizer,
}

impl AppState {
    pub fn new(aggregator: Aggregator, registry: RegistryHandle, auth: SharedAuthorizer) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            registry,
            auth,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/video/category", get(category))
        .route("/api/video/search", get(search))
        .route("/api/video/detail", get(detail))
        .route("/api/video/check", get(check))
        .route("/api/video/hot", get(hot))
        .route("/api/admin/sources/reload", post(reload_sources))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_caller,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(protected)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn default_page() -> u32 {
    1
}

#[derive(Deserialize)]
struct CategoryQuery {
    #[serde(rename = "type")]
    type_id: u32,
    #[serde(default = "default_page")]
    page: u32,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    wd: String,
}

#[derive(Deserialize)]
struct DetailQuery {
    site_key: String,
    id: String,
}

#[derive(Deserialize)]
struct CheckQuery {
    key: String,
}

async fn category(
    State(state): State<AppState>,
    Query(q): Query<CategoryQuery>,
) -> Json<AggregatedResult> {
    Json(state.aggregator.fetch_by_category(q.type_id, q.page).await)
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Json<AggregatedResult> {
    Json(state.aggregator.search(&q.wd).await)
}

async fn detail(
    State(state): State<AppState>,
    Query(q): Query<DetailQuery>,
) -> Result<Json<AggregatedResult>, AggregatorError> {
    Ok(Json(state.aggregator.detail(&q.site_key, &q.id).await?))
}

async fn check(
    State(state): State<AppState>,
    Query(q): Query<CheckQuery>,
) -> Result<Json<LatencyProbe>, AggregatorError> {
    Ok(Json(state.aggregator.latency_check(&q.key).await?))
}

async fn hot(State(state): State<AppState>) -> Json<AggregatedResult> {
    Json(state.aggregator.hot().await)
}

async fn reload_sources(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, AggregatorError> {
    if !state.aggregator.config().auth.admins.contains(&caller.id) {
        tracing::warn!(target: "auth", caller = %caller.id, "admin route refused");
        return Err(AggregatorError::Forbidden { caller: caller.id });
    }
    let n = state
        .registry
        .reload()
        .map_err(|e| AggregatorError::Reload(format!("{e:#}")))?;
    tracing::info!(target: "registry", by = %caller.username, sources = n, "sources reloaded via api");
    Ok(Json(json!({ "sources": n })))
}
