//! `GET /api/v1/health`

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::api::state::AppState;
use crate::model::{NodeInfo, Response};

pub async fn health(State(state): State<AppState>) -> Json<Response<NodeInfo>> {
    let node_name = state.config.read().await.node.node_name.clone();
    Json(Response::new(NodeInfo {
        status: "ok",
        node_name,
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    }))
}
