// src/api.rs
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};

use crate::store::ResourceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub started_at: DateTime<Utc>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(serde::Serialize)]
struct StatusResp {
    resources: usize,
    primed: bool,
    last_watch: Option<DateTime<Utc>>,
    last_index: Option<DateTime<Utc>>,
    uptime_secs: i64,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    let stats = state.store.stats().await;
    Json(StatusResp {
        resources: stats.resources,
        primed: stats.primed,
        last_watch: stats.last_watch,
        last_index: stats.last_index,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
