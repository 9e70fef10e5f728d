//! `GET /api/v1/fs`

use axum::extract::State;
use axum::Json;

use crate::api::state::AppState;
use crate::error::ApiError;
use crate::model::{FilesystemUsage, Response};

pub async fn list_fs(State(state): State<AppState>) -> Result<Json<Response<Vec<FilesystemUsage>>>, ApiError> {
    let store = state.store;
    let rows = tokio::task::spawn_blocking(move || store.list_fs_usage())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(Response::new(rows)))
}
