//! `GET /api/v1/paths` and `POST /api/v1/paths/scan`

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::collector::ScanPaths;
use crate::error::ApiError;
use crate::model::{Meta, PathStats, Response};

#[derive(Debug, Deserialize)]
pub struct ListPathsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_paths(
    State(state): State<AppState>,
    Query(query): Query<ListPathsQuery>,
) -> Result<Json<Response<Vec<PathStats>>>, ApiError> {
    if query.limit.is_some_and(|l| l < 0) || query.offset.is_some_and(|o| o < 0) {
        return Err(ApiError::BadRequest("limit and offset must be non-negative".to_string()));
    }
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit;

    let store = state.store;
    let (rows, total) = tokio::task::spawn_blocking(move || store.list_path_stats(limit, offset))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let response = if limit.is_some() || query.offset.is_some() {
        Response::with_meta(rows, Meta { total: Some(total), limit, offset: Some(offset) })
    } else {
        Response::new(rows)
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct TriggerScanRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerScanResponse {
    pub status: &'static str,
    pub paths: Vec<String>,
    pub message: String,
}

pub async fn trigger_scan(
    State(state): State<AppState>,
    Json(request): Json<TriggerScanRequest>,
) -> Result<(axum::http::StatusCode, Json<TriggerScanResponse>), ApiError> {
    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("paths must not be empty".to_string()));
    }

    state.scanner.trigger_scan(&request.paths).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(TriggerScanResponse {
            status: "scan triggered",
            paths: request.paths.clone(),
            message: format!("triggered scan for {} path(s)", request.paths.len()),
        }),
    ))
}
