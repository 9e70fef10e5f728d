//! `GET /api/v1/processes`

use axum::extract::State;
use axum::Json;

use crate::api::state::AppState;
use crate::error::ApiError;
use crate::model::{ProcessInfo, Response};

pub async fn list_processes(
    State(state): State<AppState>,
) -> Result<Json<Response<Vec<ProcessInfo>>>, ApiError> {
    let store = state.store;
    let rows = tokio::task::spawn_blocking(move || store.list_processes())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(Response::new(rows)))
}
