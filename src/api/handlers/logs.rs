//! `GET /api/v1/logs` and `GET /api/v1/logs/files`

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::state::AppState;
use crate::error::ApiError;
use crate::model::{LogEntry, LogFileInfo, Response};

const DEFAULT_LOG_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    name: Option<String>,
    limit: Option<i64>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<Response<Vec<LogEntry>>>, ApiError> {
    if query.limit.is_some_and(|l| l <= 0) {
        return Err(ApiError::BadRequest("limit must be positive".to_string()));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let store = state.store;
    let rows =
        tokio::task::spawn_blocking(move || store.list_log_entries(query.name.as_deref(), limit))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(Response::new(rows)))
}

pub async fn list_log_files(
    State(state): State<AppState>,
) -> Result<Json<Response<Vec<LogFileInfo>>>, ApiError> {
    let configs = state.config.read().await.logs.clone();
    let infos = tokio::task::spawn_blocking(move || {
        configs
            .into_iter()
            .map(|cfg| {
                let metadata = std::fs::metadata(&cfg.path).ok();
                let size = metadata.as_ref().map(|m| m.len() as i64).unwrap_or(0);
                let mod_time = metadata
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(Utc::now);
                LogFileInfo {
                    name: cfg.name,
                    path: cfg.path,
                    max_lines: cfg.max_lines as i64,
                    size,
                    mod_time,
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(Response::new(infos)))
}
